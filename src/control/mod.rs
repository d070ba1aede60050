//! Control protocol between the gateway and the agent CLI
//!
//! The CLI reports hook invocations as `{"type":"response","status":"hook",..}`
//! lines; the gateway answers with `{"type":"request","method":"hook_response",..}`
//! and may send `interrupt` requests.

mod handler;
mod messages;

pub use handler::{HookInvocation, ProtocolHandler};
pub use messages::{ControlMessage, ControlRequest, ControlResponse};
