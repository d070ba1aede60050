#![recursion_limit = "256"]

//! # Agent Gateway
//!
//! A WebSocket gateway that multiplexes many Claude agent sessions over
//! persistent client connections. Each session owns one agent process; tool
//! calls the agent wants to make can be held until the client approves them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_gateway::{ClaudeCliBackend, Gateway, GatewayConfig, MemorySessionStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let backend = Arc::new(ClaudeCliBackend::new(config.cli_path.clone()));
//!     let gateway = Gateway::start(config, backend, Arc::new(MemorySessionStore::new())).await?;
//!
//!     let listener = tokio::net::TcpListener::bind(gateway.config().bind_address()).await?;
//!     agent_gateway::serve(listener, gateway).await
//! }
//! ```
//!
//! ## Protocol
//!
//! Clients connect to `/ws` and exchange JSON frames tagged by `type`:
//!
//! ```text
//! -> {"type":"create_session","options":{"tools":["Write"]}}
//! <- {"type":"session_created","session_id":"…","session":{…}}
//! -> {"type":"send_prompt","session_id":"…","prompt":"Create hello.txt"}
//! <- {"type":"agent_thinking","session_id":"…","thinking":true}
//! <- {"type":"permission_request","session_id":"…","request_id":"…","tool":"Write",…}
//! -> {"type":"permission_response","request_id":"…","approved":true}
//! <- {"type":"permission_acknowledged",…,"status":"executing"}
//! <- {"type":"agent_message",…,"complete":true}
//! ```
//!
//! See [`protocol`] for every frame.
//!
//! ## Architecture
//!
//! - [`registry`]: Session records, capacity limit and idle reaper
//! - [`permissions`]: Permission broker holding tool calls for client approval
//! - [`adapter`]: Agent handles per session and response normalization
//! - [`backend`]: Agent execution interface (CLI subprocess or scripted)
//! - [`server`]: HTTP routes and the WebSocket connection dispatcher
//! - [`lifecycle`]: Startup and shutdown of the shared components
//! - [`storage`]: Best-effort persistence of sessions and messages
//! - [`agents`]: Agent definitions loaded from markdown files
//! - [`client`], [`transport`], [`control`], [`message`], [`hooks`]: Claude
//!   Code CLI driver used by the CLI backend
//! - [`config`]: `AGENT_SERVER_*` environment configuration
//! - [`error`]: Error types
//!
//! ## Requirements
//!
//! - Node.js (for Claude Code CLI)
//! - Claude Code: `npm install -g @anthropic-ai/claude-code`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod agents;
pub mod backend;
pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod message;
pub mod permissions;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod storage;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use adapter::{AgentAdapter, EventStream};
pub use agents::{AgentCatalog, AgentDefinition, AgentLoader};
pub use backend::{
    AgentBackend, AgentConfig, AgentHandle, ClaudeCliBackend, ScriptedBackend, ScriptedTurn,
};
pub use client::AgentClient;
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use hooks::{HookManager, HookMatcherBuilder};
pub use lifecycle::Gateway;
pub use permissions::{EventSink, PermissionBroker, PermissionPolicy, event_sink};
pub use protocol::{InboundFrame, OutboundFrame};
pub use registry::{RegistryConfig, SessionRegistry, SessionUpdate};
pub use storage::{HttpSessionStore, MemorySessionStore, SessionStore};
pub use types::{
    MessageId, NormalizedEvent, PermissionMode, RequestId, Session, SessionId, SessionOptions,
    SessionStatus, ToolName,
};

/// Version of the gateway
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// EMBEDDED SERVER FUNCTION
// ============================================================================

use std::sync::Arc;

/// Serve the gateway on a pre-bound listener until it shuts down.
///
/// Returns once [`Gateway::shutdown`] has been called (which cancels the
/// gateway's shutdown token) and the HTTP server has drained.
///
/// # Errors
/// Returns error if the server fails while accepting connections
pub async fn serve(listener: tokio::net::TcpListener, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let token = gateway.shutdown_token();
    log::info!("Agent gateway listening on {addr}");

    axum::serve(listener, server::router(gateway))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Server on {addr} failed: {e}"))
}
