//! Raw agent message types
//!
//! These mirror the line-delimited JSON the agent CLI prints in stream-json
//! mode. The adapter turns them into [`NormalizedEvent`](super::events::NormalizedEvent)s.

use serde::{Deserialize, Serialize};

// ============================================================================
// Message Types
// ============================================================================

/// Content block types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Thinking content block (extended thinking)
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature for verification
        #[serde(default)]
        signature: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
        /// Result content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<serde_json::Value>,
        /// Whether this is an error result
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool use block
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Assistant message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessageContent {
    /// Model that generated the message
    #[serde(default)]
    pub model: String,
    /// Message content blocks
    pub content: Vec<ContentBlock>,
}

/// Message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// User message (tool results echoed back by the CLI)
    User {
        /// Raw message content
        message: serde_json::Value,
    },
    /// Assistant message
    Assistant {
        /// Message content
        message: AssistantMessageContent,
        /// Parent tool use ID for nested conversations
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    /// System message
    System {
        /// System message subtype
        subtype: String,
        /// Additional system message data
        #[serde(flatten)]
        data: serde_json::Value,
    },
    /// End of one turn
    Result {
        /// Result subtype
        subtype: String,
        /// Whether the turn failed
        #[serde(default)]
        is_error: bool,
        /// Number of conversation turns
        #[serde(default)]
        num_turns: u32,
        /// Total duration in milliseconds
        #[serde(default)]
        duration_ms: u64,
        /// Agent-side session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Total cost in USD
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Result text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// Stream event for partial messages
    StreamEvent {
        /// Raw stream event data
        event: serde_json::Value,
    },
}

impl Message {
    /// Create an assistant message from blocks
    #[must_use]
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::Assistant {
            message: AssistantMessageContent {
                model: String::new(),
                content,
            },
            parent_tool_use_id: None,
        }
    }

    /// Create a successful end-of-turn marker
    #[must_use]
    pub fn result_success() -> Self {
        Self::Result {
            subtype: "success".to_string(),
            is_error: false,
            num_turns: 1,
            duration_ms: 0,
            session_id: None,
            total_cost_usd: None,
            result: None,
        }
    }

    /// Whether this message ends the current turn
    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}
