//! Session data model
//!
//! A [`Session`] is the registry's record of one conversation. It is always
//! handed out as a snapshot copy; the live value sits behind the registry's
//! per-session lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

use super::identifiers::{SessionId, ToolName};
use super::mcp::McpServerConfig;
use super::permissions::PermissionMode;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Connected but not yet used
    Active,
    /// Waiting for a prompt
    #[default]
    Idle,
    /// A prompt is streaming
    Processing,
    /// Last prompt failed
    Error,
    /// Removed from the registry
    Ended,
}

/// Tools enabled when a client does not choose
pub const DEFAULT_TOOLS: &[&str] = &["Read", "Write", "Edit", "Bash", "Search"];

fn default_tools() -> Vec<ToolName> {
    DEFAULT_TOOLS.iter().map(|t| ToolName::new(*t)).collect()
}

/// Accept a tool list or a JSON-encoded tool list (as stored records carry it)
fn tools_from_list_or_json<'de, D>(deserializer: D) -> Result<Vec<ToolName>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tools {
        List(Vec<ToolName>),
        Encoded(String),
        Missing(()),
    }

    match Tools::deserialize(deserializer)? {
        Tools::List(tools) => Ok(tools),
        Tools::Encoded(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
        Tools::Missing(()) => Ok(default_tools()),
    }
}

/// Configuration snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Custom system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Tools the agent may use
    #[serde(default = "default_tools", deserialize_with = "tools_from_list_or_json")]
    pub tools: Vec<ToolName>,
    /// Working directory of the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Token limit hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether tool calls need client approval
    #[serde(default)]
    pub permission_mode: PermissionMode,
    /// Formatted transcript of a conversation being resumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<String>,
    /// Conversation this session resumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_conversation_id: Option<String>,
    /// Agent definition the session was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// External tool servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            tools: default_tools(),
            working_directory: None,
            max_tokens: None,
            temperature: None,
            permission_mode: PermissionMode::Default,
            conversation_history: None,
            original_conversation_id: None,
            agent_name: None,
            mcp_servers: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Set the enabled tools
    #[must_use]
    pub fn with_tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ToolName>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the permission mode
    #[must_use]
    pub const fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Attach an external tool server
    #[must_use]
    pub fn with_mcp_server(mut self, server: McpServerConfig) -> Self {
        self.mcp_servers.push(server);
        self
    }
}

/// Snapshot of one registered session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Configuration snapshot
    pub options: SessionOptions,
    /// Prompts handled so far
    pub message_count: u64,
    /// Text of the last failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub fn new(id: SessionId, options: SessionOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            status: SessionStatus::Idle,
            options,
            message_count: 0,
            error_message: None,
        }
    }

    /// Display name used for stored records
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("Session {}", self.id.short())
    }
}
