//! Protocol handler for control messages exchanged with the agent CLI

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

use crate::error::{GatewayError, Result};
use crate::types::hooks::HookEvent;
use crate::types::identifiers::RequestId;

use super::messages::{ControlMessage, ControlRequest, ControlResponse};

/// Hook invocation forwarded to the hook task: (hook id, event, payload)
pub type HookInvocation = (String, HookEvent, serde_json::Value);

/// Protocol handler for managing control protocol communication
pub struct ProtocolHandler {
    next_request_id: AtomicU64,
    pending_requests: parking_lot::Mutex<HashMap<RequestId, oneshot::Sender<ControlResponse>>>,
    hook_tx: Option<mpsc::UnboundedSender<HookInvocation>>,
}

impl ProtocolHandler {
    /// Create a new protocol handler
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            pending_requests: parking_lot::Mutex::new(HashMap::new()),
            hook_tx: None,
        }
    }

    /// Set hook callback channel
    pub fn set_hook_channel(&mut self, tx: mpsc::UnboundedSender<HookInvocation>) {
        self.hook_tx = Some(tx);
    }

    /// Generate next request ID
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        RequestId::new(format!("req-{id}"))
    }

    /// Track a request whose response should be awaited
    #[must_use]
    pub fn track(&self, request: &ControlRequest) -> oneshot::Receiver<ControlResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending_requests
            .lock()
            .insert(Self::request_id(request).clone(), tx);
        rx
    }

    /// Request ID of a control request
    #[must_use]
    pub const fn request_id(request: &ControlRequest) -> &RequestId {
        match request {
            ControlRequest::Interrupt { id } | ControlRequest::HookResponse { id, .. } => id,
        }
    }

    /// Route an incoming control response
    ///
    /// # Errors
    /// Returns error if a hook invocation arrives after the hook task stopped
    pub fn handle_response(&self, response: ControlResponse) -> Result<()> {
        match response {
            ControlResponse::Success { ref id, .. } | ControlResponse::Error { ref id, .. } => {
                let pending = self.pending_requests.lock().remove(id);
                if let Some(tx) = pending {
                    let _ = tx.send(response);
                }
                Ok(())
            }
            ControlResponse::Hook {
                id,
                event,
                event_data,
            } => {
                let Some(ref tx) = self.hook_tx else {
                    log::debug!("Ignoring hook {id} ({event:?}): no hooks registered");
                    return Ok(());
                };
                let data = event_data.unwrap_or_else(|| serde_json::json!({}));
                tx.send((id, event, data))
                    .map_err(|_| GatewayError::protocol_error("Hook channel closed"))
            }
        }
    }

    /// Create interrupt request
    #[must_use]
    pub fn create_interrupt_request(&self) -> ControlRequest {
        ControlRequest::Interrupt { id: self.next_id() }
    }

    /// Create hook response
    #[must_use]
    pub fn create_hook_response(
        &self,
        hook_id: String,
        response: serde_json::Value,
    ) -> ControlRequest {
        ControlRequest::HookResponse {
            id: self.next_id(),
            hook_id,
            response,
        }
    }

    /// Serialize a control request as one output line
    ///
    /// # Errors
    /// Returns error if JSON serialization fails
    pub fn serialize_request(&self, request: ControlRequest) -> Result<String> {
        let line = serde_json::to_string(&ControlMessage::Request(request))?;
        Ok(format!("{line}\n"))
    }

    /// Try to read a raw CLI value as a control message
    #[must_use]
    pub fn parse_control(&self, value: &serde_json::Value) -> Option<ControlMessage> {
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("request" | "response") => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}
