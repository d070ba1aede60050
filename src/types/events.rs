//! Normalized events
//!
//! The contract between the agent adapter (and permission broker) and the
//! connection layer. Each variant maps onto exactly one outbound frame.

use super::identifiers::{MessageId, RequestId, ToolName};
use super::permissions::AcknowledgedStatus;

/// Typed, backend-independent agent occurrence
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    /// The agent started (`true`) or stopped (`false`) thinking
    Thinking(bool),
    /// Assistant text; `complete` marks the end of a logical message
    Message {
        /// Text chunk, or the whole message when complete
        content: String,
        /// Whether this is the final flush of the message
        complete: bool,
        /// Logical message this text belongs to
        message_id: MessageId,
    },
    /// The agent invoked a tool
    ToolUse {
        /// Tool name
        tool: ToolName,
        /// Tool parameters
        parameters: serde_json::Value,
        /// Agent-side correlation token
        tool_use_id: String,
        /// Full structured input for state-carrying tools
        input: Option<serde_json::Value>,
    },
    /// A tool call waits for client approval
    PermissionRequest {
        /// Request identifier
        request_id: RequestId,
        /// Tool name
        tool: ToolName,
        /// Tool parameters
        parameters: serde_json::Value,
        /// Human-readable summary
        description: String,
    },
    /// A pending request was answered (or expired)
    PermissionAcknowledged {
        /// Request identifier
        request_id: RequestId,
        /// Whether the tool may run
        approved: bool,
        /// Tool name
        tool: ToolName,
        /// Resulting state
        status: AcknowledgedStatus,
    },
    /// The prompt failed
    Error(String),
}

impl NormalizedEvent {
    /// Create a message event
    pub fn message(content: impl Into<String>, complete: bool, message_id: &MessageId) -> Self {
        Self::Message {
            content: content.into(),
            complete,
            message_id: message_id.clone(),
        }
    }

    /// Whether this is an error event
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
