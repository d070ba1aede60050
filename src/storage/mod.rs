//! Session and message persistence
//!
//! Persistence is best-effort: every call reports success as a `bool` (or an
//! empty list on failure) and logs the cause. Nothing here ever fails a
//! client request.

mod http;
mod memory;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::types::{Session, SessionId};

pub use http::HttpSessionStore;
pub use memory::MemorySessionStore;

/// Message id under which a prompt is stored
pub const USER_PROMPT_MESSAGE_ID: &str = "user-prompt";

/// Stored session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier
    pub session_id: SessionId,
    /// Display name
    pub session_name: String,
    /// Avatar shown by clients
    #[serde(default)]
    pub avatar_name: String,
    /// Working directory, empty when unset
    #[serde(default)]
    pub working_directory: String,
    /// Agent definition name, empty when unset
    #[serde(default)]
    pub agent_name: String,
    /// Custom system prompt, empty when unset
    #[serde(default)]
    pub system_prompt: String,
    /// Permission mode flag value
    #[serde(default)]
    pub permission_mode: String,
    /// Enabled tools
    #[serde(default)]
    pub tools: Vec<String>,
}

impl SessionRecord {
    /// Record for a freshly created session
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let options = &session.options;
        Self {
            session_id: session.id.clone(),
            session_name: session.display_name(),
            avatar_name: String::new(),
            working_directory: options
                .working_directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            agent_name: options.agent_name.clone().unwrap_or_default(),
            system_prompt: options.system_prompt.clone().unwrap_or_default(),
            permission_mode: options.permission_mode.as_str().to_string(),
            tools: options.tools.iter().map(|t| t.as_str().to_string()).collect(),
        }
    }
}

/// Stored message record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message identifier, unique within the session
    pub message_id: String,
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
    /// Tool name for tool messages
    #[serde(default)]
    pub tool_name: String,
    /// Tool result for tool messages
    #[serde(default)]
    pub tool_result: String,
    /// Token usage, when known
    #[serde(default)]
    pub token_count: u64,
}

impl MessageRecord {
    /// Plain user or assistant message
    pub fn text(
        message_id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            role: role.into(),
            content: content.into(),
            tool_name: String::new(),
            tool_result: String::new(),
            token_count: 0,
        }
    }

    /// Tool invocation keyed by the agent's correlation token
    pub fn tool_use(tool_use_id: impl Into<String>, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        Self {
            message_id: tool_use_id.into(),
            role: "assistant".to_string(),
            content: format!("Using tool: {tool}"),
            tool_name: tool,
            tool_result: String::new(),
            token_count: 0,
        }
    }
}

/// Persistence collaborator
pub trait SessionStore: Send + Sync {
    /// Store a session record
    fn save_session(&self, record: SessionRecord) -> BoxFuture<'_, bool>;

    /// Append a message to a session
    fn save_message(&self, session_id: SessionId, record: MessageRecord) -> BoxFuture<'_, bool>;

    /// Raw records of the sessions to restore
    fn load_sessions(&self) -> BoxFuture<'_, Vec<serde_json::Value>>;

    /// Raw message history of one session
    fn load_session_messages(&self, session_id: SessionId)
    -> BoxFuture<'_, Vec<serde_json::Value>>;
}
