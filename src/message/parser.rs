//! Message parser for agent CLI output

use crate::error::{GatewayError, Result};
use crate::types::messages::Message;

/// Parse a JSON value into a typed Message
///
/// # Errors
/// Returns `GatewayError::MessageParse` if the JSON is not a known message
pub fn parse_message(data: serde_json::Value) -> Result<Message> {
    serde_json::from_value(data.clone()).map_err(|e| {
        GatewayError::message_parse(format!("Failed to parse message: {e}"), Some(data))
    })
}
