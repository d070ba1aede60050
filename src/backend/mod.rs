//! Agent execution backends
//!
//! The gateway drives agents through two small object-safe traits:
//! [`AgentBackend`] starts one agent per session and [`AgentHandle`] is the
//! live agent. A handle turns a prompt into a stream of raw [`Message`]s that
//! ends with the turn's result message.
//!
//! - [`ClaudeCliBackend`] runs the agent CLI as a subprocess
//! - [`ScriptedBackend`] replays scripted turns in-process

pub mod claude;
pub mod scripted;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::hooks::HookManager;
use crate::types::{McpServerConfig, Message, PermissionMode, SessionId, ToolName};

pub use claude::ClaudeCliBackend;
pub use scripted::{ScriptStep, ScriptedBackend, ScriptedTurn, ToolOutcome};

/// Stream of raw agent messages for one turn
pub type MessageStream = BoxStream<'static, Result<Message>>;

/// Launch configuration of one agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Session the agent serves
    pub session_id: SessionId,
    /// Full system prompt
    pub system_prompt: String,
    /// Tools the agent may use
    pub allowed_tools: Vec<ToolName>,
    /// Working directory of the agent
    pub cwd: Option<PathBuf>,
    /// Permission mode passed to the agent
    pub permission_mode: PermissionMode,
    /// External tool servers
    pub mcp_servers: Vec<McpServerConfig>,
    /// Extra environment for the agent process
    pub env: HashMap<String, String>,
}

impl AgentConfig {
    /// Configuration with an empty prompt and no tools
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            system_prompt: String::new(),
            allowed_tools: Vec::new(),
            cwd: None,
            permission_mode: PermissionMode::default(),
            mcp_servers: Vec::new(),
            env: HashMap::new(),
        }
    }
}

/// A running agent bound to one session
pub trait AgentHandle: Send + Sync {
    /// Send a prompt and stream the agent's reply.
    ///
    /// Turns on one handle are serialized: a second query waits until the
    /// first stream is dropped.
    ///
    /// # Errors
    /// Returns error if the prompt cannot be delivered
    fn query(&self, prompt: String) -> BoxFuture<'_, Result<MessageStream>>;

    /// Ask the agent to stop the current turn
    ///
    /// # Errors
    /// Returns error if the request cannot be sent
    fn interrupt(&self) -> BoxFuture<'_, Result<()>>;

    /// Stop the agent and release its resources
    ///
    /// # Errors
    /// Returns error if shutdown fails; the handle is unusable either way
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Factory for agent handles
pub trait AgentBackend: Send + Sync {
    /// Start an agent. PreToolUse hooks in `hooks` run before every tool call.
    ///
    /// # Errors
    /// Returns error if the agent cannot be started
    fn spawn(
        &self,
        config: AgentConfig,
        hooks: HookManager,
    ) -> BoxFuture<'_, Result<Arc<dyn AgentHandle>>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
