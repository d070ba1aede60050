//! Background tasks for `AgentClient`
//!
//! Message reading, control writing and hook handling each run on their own
//! task.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::control::{ControlMessage, ControlRequest, HookInvocation, ProtocolHandler};
use crate::error::Result;
use crate::hooks::HookManager;
use crate::message::parse_message;
use crate::transport::{SubprocessTransport, Transport};
use crate::types::hooks::{HookEvent, HookInput};
use crate::types::messages::Message;
use crate::types::permissions::PermissionDecision;

impl super::AgentClient {
    /// Message reader task - reads from transport and routes control traffic
    pub(super) async fn message_reader_task(
        transport: Arc<Mutex<SubprocessTransport>>,
        protocol: Arc<ProtocolHandler>,
        message_tx: mpsc::UnboundedSender<Result<Message>>,
    ) {
        // Take the receiver without keeping the transport locked
        let mut msg_stream = {
            let mut transport_guard = transport.lock().await;
            transport_guard.read_messages()
        };

        while let Some(result) = msg_stream.recv().await {
            match result {
                Ok(value) => {
                    if let Some(control) = protocol.parse_control(&value) {
                        match control {
                            ControlMessage::Response(response) => {
                                if let Err(e) = protocol.handle_response(response) {
                                    log::warn!("Control response not handled: {e}");
                                }
                            }
                            ControlMessage::Request(_) => {
                                log::debug!("Ignoring control request from agent");
                            }
                        }
                        continue;
                    }

                    match parse_message(value) {
                        Ok(msg) => {
                            if message_tx.send(Ok(msg)).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::debug!("Skipping unrecognized agent output: {e}"),
                    }
                }
                Err(e) => {
                    let _ = message_tx.send(Err(e));
                    break;
                }
            }
        }
    }

    /// Control message writer task - writes control requests to transport
    pub(super) async fn control_writer_task(
        transport: Arc<Mutex<SubprocessTransport>>,
        protocol: Arc<ProtocolHandler>,
        mut control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    ) {
        while let Some(request) = control_rx.recv().await {
            let line = match protocol.serialize_request(request) {
                Ok(line) => line,
                Err(e) => {
                    log::error!("Failed to serialize control request: {e}");
                    continue;
                }
            };

            let mut transport_guard = transport.lock().await;
            if let Err(e) = transport_guard.write(&line).await {
                log::warn!("Control writer stopped: {e}");
                break;
            }
        }
    }

    /// Hook handler task - answers hook invocations from the CLI
    pub(super) async fn hook_handler_task(
        manager: Arc<HookManager>,
        protocol: Arc<ProtocolHandler>,
        mut hook_rx: mpsc::UnboundedReceiver<HookInvocation>,
        control_tx: mpsc::UnboundedSender<ControlRequest>,
    ) {
        while let Some((hook_id, event, event_data)) = hook_rx.recv().await {
            if matches!(event, HookEvent::PreToolUse | HookEvent::PostToolUse)
                && !event_data.is_object()
            {
                log::warn!("Hook {hook_id} received non-object event_data for {event:?}");
            }

            let input = HookInput::from_event_data(event, &event_data);
            let output = match manager.invoke(input).await {
                Ok(output) => output,
                Err(e) => {
                    // The CLI waits for an answer, so a failed hook must still deny
                    log::error!("Hook processing error: {e}");
                    PermissionDecision::deny(e.to_string()).into_hook_output()
                }
            };

            let response = match serde_json::to_value(&output) {
                Ok(value) => value,
                Err(e) => {
                    log::error!("Failed to encode hook output: {e}");
                    serde_json::json!({})
                }
            };
            let request = protocol.create_hook_response(hook_id, response);
            if let Err(e) = control_tx.send(request) {
                log::error!("Failed to send hook response: {e}");
                break;
            }
            log::debug!("Hook processed for event {event:?}");
        }
    }
}
