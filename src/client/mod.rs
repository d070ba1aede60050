//! Bidirectional client for one agent CLI process
//!
//! The client splits the subprocess into independent background tasks so a
//! turn waiting on a permission decision never blocks the control channel:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     AgentClient                      │
//! │                                                      │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────┐  │
//! │  │ Message Reader │  │ Control Writer │  │ Hooks  │  │
//! │  │ stdout → msgs  │  │ requests → in  │  │ invoke │  │
//! │  └───────┬────────┘  └───────┬────────┘  └───┬────┘  │
//! │          │                   │               │       │
//! │          │   ┌───────────────┴──┐            │       │
//! │          └──→│    Transport     │←───────────┘       │
//! │              │  (Arc<Mutex>)    │  (via writer)      │
//! │              └──────────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! - The reader takes the transport's receiver once and never holds the lock
//! - Writers lock the transport only for the duration of one line
//! - Hook invocations are answered through the control writer

mod client_impl;
mod tasks;

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::control::{ControlRequest, ProtocolHandler};
use crate::error::Result;
use crate::transport::SubprocessTransport;
use crate::types::identifiers::SessionId;
use crate::types::messages::Message;

/// Client for bidirectional communication with one agent process
pub struct AgentClient {
    /// Session served by the process
    session_id: SessionId,
    /// Transport layer
    transport: Arc<Mutex<SubprocessTransport>>,
    /// Control protocol handler
    protocol: Arc<ProtocolHandler>,
    /// Parsed messages; the lock is held for a whole turn
    message_rx: Arc<Mutex<mpsc::UnboundedReceiver<Result<Message>>>>,
    /// Control message sender
    control_tx: mpsc::UnboundedSender<ControlRequest>,
    /// Background tasks, aborted on close
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}
