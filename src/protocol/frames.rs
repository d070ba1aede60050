//! WebSocket frames
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    AcknowledgedStatus, MessageId, NormalizedEvent, PermissionVerdict, RequestId, Session,
    SessionId, SessionOptions, ToolName,
};

/// Inbound frame types the dispatcher understands
pub const INBOUND_TYPES: &[&str] = &[
    "auth",
    "create_session",
    "send_prompt",
    "end_session",
    "list_sessions",
    "kill_all_agents",
    "permission_response",
    "ping",
];

/// Frame sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// In-band credentials
    Auth {
        /// Shared secret, optionally prefixed with `Bearer `
        token: String,
    },
    /// Create a session
    CreateSession {
        /// Requested identifier; generated when absent
        #[serde(default)]
        session_id: Option<SessionId>,
        /// Session configuration
        #[serde(default)]
        options: SessionOptions,
    },
    /// Send a prompt to a session
    SendPrompt {
        /// Target session
        session_id: SessionId,
        /// Prompt text
        prompt: String,
    },
    /// End a session
    EndSession {
        /// Target session
        session_id: SessionId,
    },
    /// List live sessions
    ListSessions {},
    /// Close every agent
    KillAllAgents {},
    /// Answer a permission request
    PermissionResponse {
        /// Session the request belongs to
        #[serde(default)]
        session_id: Option<SessionId>,
        /// Request being answered
        request_id: RequestId,
        /// Whether the tool may run
        approved: bool,
        /// Optional reason
        #[serde(default)]
        reason: Option<String>,
    },
    /// Keepalive
    Ping {
        /// Client timestamp, echoed back
        #[serde(default)]
        timestamp: Option<serde_json::Value>,
    },
}

impl InboundFrame {
    /// Wire name of the frame type
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::CreateSession { .. } => "create_session",
            Self::SendPrompt { .. } => "send_prompt",
            Self::EndSession { .. } => "end_session",
            Self::ListSessions {} => "list_sessions",
            Self::KillAllAgents {} => "kill_all_agents",
            Self::PermissionResponse { .. } => "permission_response",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Why an inbound text frame was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not JSON at all
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    /// `type` missing or not recognized
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    /// Known type with missing or malformed fields
    #[error("Invalid {frame_type} frame: {message}")]
    Invalid {
        /// Declared frame type
        frame_type: String,
        /// Deserializer message
        message: String,
    },
}

/// Parse one inbound text frame
///
/// # Errors
/// Returns a [`FrameError`] describing the rejection
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    let frame_type = match value.get("type") {
        Some(serde_json::Value::String(t)) => t.clone(),
        Some(other) => other.to_string(),
        None => String::from("None"),
    };
    if !INBOUND_TYPES.contains(&frame_type.as_str()) {
        return Err(FrameError::UnknownType(frame_type));
    }

    serde_json::from_value(value).map_err(|e| FrameError::Invalid {
        frame_type,
        message: e.to_string(),
    })
}

/// Frame sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// In-band authentication accepted
    AuthSuccess {},
    /// Session created
    SessionCreated {
        /// New session
        session_id: SessionId,
        /// Snapshot
        session: Session,
    },
    /// Assistant text
    AgentMessage {
        /// Session
        session_id: SessionId,
        /// Text chunk or full message
        content: String,
        /// Whether this closes the logical message
        complete: bool,
        /// Logical message identifier
        message_id: MessageId,
    },
    /// Thinking indicator
    AgentThinking {
        /// Session
        session_id: SessionId,
        /// Whether the agent is working
        thinking: bool,
    },
    /// Tool invocation
    AgentToolUse {
        /// Session
        session_id: SessionId,
        /// Tool name
        tool: ToolName,
        /// Tool parameters
        parameters: serde_json::Value,
        /// Agent-side correlation token
        tool_use_id: String,
        /// Structured input of state-carrying tools
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
    /// Prompt failed
    AgentError {
        /// Session
        session_id: SessionId,
        /// Failure text
        message: String,
    },
    /// Tool call awaiting approval
    PermissionRequest {
        /// Session
        session_id: SessionId,
        /// Request identifier
        request_id: RequestId,
        /// Tool name
        tool: ToolName,
        /// Tool parameters
        parameters: serde_json::Value,
        /// Human-readable summary
        description: String,
    },
    /// Answer (or expiry) of a permission request
    PermissionAcknowledged {
        /// Session
        session_id: SessionId,
        /// Request identifier
        request_id: RequestId,
        /// Whether the tool runs
        approved: bool,
        /// Tool name
        tool: ToolName,
        /// `executing`, `denied` or `timed_out`
        status: AcknowledgedStatus,
    },
    /// Session ended
    SessionEnded {
        /// Ended session
        session_id: SessionId,
    },
    /// Live sessions
    SessionsList {
        /// Snapshots
        sessions: Vec<Session>,
    },
    /// Every agent closed
    AgentsKilled {
        /// Agents closed cleanly
        killed_count: usize,
        /// Sessions whose agent was live before the kill
        sessions_ended: Vec<SessionId>,
    },
    /// Request failed
    Error {
        /// Failure text
        message: String,
        /// Session concerned, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// Extra structured details
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
    /// Keepalive answer
    Pong {
        /// Echoed timestamp
        timestamp: serde_json::Value,
    },
}

impl OutboundFrame {
    /// Error frame not tied to a session
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            session_id: None,
            details: None,
        }
    }

    /// Error frame for a session
    pub fn session_error(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            session_id: Some(session_id.clone()),
            details: None,
        }
    }

    /// Pong echoing `timestamp`, or the current time when absent
    #[must_use]
    pub fn pong(timestamp: Option<serde_json::Value>) -> Self {
        let timestamp = timestamp
            .filter(|t| !t.is_null())
            .unwrap_or_else(|| serde_json::json!(chrono::Utc::now().to_rfc3339()));
        Self::Pong { timestamp }
    }

    /// Frame carrying a normalized event of `session_id`
    #[must_use]
    pub fn from_event(session_id: &SessionId, event: NormalizedEvent) -> Self {
        let session_id = session_id.clone();
        match event {
            NormalizedEvent::Thinking(thinking) => Self::AgentThinking {
                session_id,
                thinking,
            },
            NormalizedEvent::Message {
                content,
                complete,
                message_id,
            } => Self::AgentMessage {
                session_id,
                content,
                complete,
                message_id,
            },
            NormalizedEvent::ToolUse {
                tool,
                parameters,
                tool_use_id,
                input,
            } => Self::AgentToolUse {
                session_id,
                tool,
                parameters,
                tool_use_id,
                input,
            },
            NormalizedEvent::PermissionRequest {
                request_id,
                tool,
                parameters,
                description,
            } => Self::PermissionRequest {
                session_id,
                request_id,
                tool,
                parameters,
                description,
            },
            NormalizedEvent::PermissionAcknowledged {
                request_id,
                approved,
                tool,
                status,
            } => Self::PermissionAcknowledged {
                session_id,
                request_id,
                approved,
                tool,
                status,
            },
            NormalizedEvent::Error(message) => Self::AgentError {
                session_id,
                message,
            },
        }
    }

    /// Wire name of the frame type
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthSuccess {} => "auth_success",
            Self::SessionCreated { .. } => "session_created",
            Self::AgentMessage { .. } => "agent_message",
            Self::AgentThinking { .. } => "agent_thinking",
            Self::AgentToolUse { .. } => "agent_tool_use",
            Self::AgentError { .. } => "agent_error",
            Self::PermissionRequest { .. } => "permission_request",
            Self::PermissionAcknowledged { .. } => "permission_acknowledged",
            Self::SessionEnded { .. } => "session_ended",
            Self::SessionsList { .. } => "sessions_list",
            Self::AgentsKilled { .. } => "agents_killed",
            Self::Error { .. } => "error",
            Self::Pong { .. } => "pong",
        }
    }

    /// Serialize to the text sent on the socket
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Verdict carried by a `permission_response` frame
#[must_use]
pub fn verdict(approved: bool, reason: Option<String>) -> PermissionVerdict {
    PermissionVerdict { approved, reason }
}
