//! Control protocol message types
//!
//! Control messages share stdout/stdin with the regular stream-json messages
//! and are told apart by their `type` tag.

use serde::{Deserialize, Serialize};

use crate::types::hooks::HookEvent;
use crate::types::identifiers::RequestId;

/// Control message envelope for all protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Request from the gateway to the CLI
    #[serde(rename = "request")]
    Request(ControlRequest),
    /// Response or callback from the CLI to the gateway
    #[serde(rename = "response")]
    Response(ControlResponse),
}

/// Request from the gateway to the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ControlRequest {
    /// Interrupt the current operation
    #[serde(rename = "interrupt")]
    Interrupt {
        /// Unique request identifier
        id: RequestId,
    },
    /// Respond to a hook invocation
    #[serde(rename = "hook_response")]
    HookResponse {
        /// Unique request identifier
        id: RequestId,
        /// Hook invocation ID being responded to
        hook_id: String,
        /// Hook output
        response: serde_json::Value,
    },
}

/// Response or callback from the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ControlResponse {
    /// Successful response
    #[serde(rename = "success")]
    Success {
        /// Request ID this responds to
        id: RequestId,
        /// Optional response data
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    /// Error response
    #[serde(rename = "error")]
    Error {
        /// Request ID this responds to
        id: RequestId,
        /// Error message
        message: String,
    },
    /// Hook invocation from the CLI
    #[serde(rename = "hook")]
    Hook {
        /// Hook invocation ID
        id: String,
        /// Hook event
        event: HookEvent,
        /// Event-specific data payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_data: Option<serde_json::Value>,
    },
}
