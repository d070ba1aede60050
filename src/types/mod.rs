//! Type definitions for the agent gateway
//!
//! This module contains the type definitions shared by every component,
//! organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `RequestId`, `ToolName`, `MessageId`)
//! - [`session`] - Session snapshot, status and options
//! - [`permissions`] - Permission modes, verdicts and hook decisions
//! - [`hooks`] - Hook system types and callbacks
//! - [`mcp`] - External tool server configuration
//! - [`messages`] - Raw agent message and content block types
//! - [`events`] - Normalized events streamed to connections

pub mod events;
pub mod hooks;
pub mod identifiers;
pub mod mcp;
pub mod messages;
pub mod permissions;
pub mod session;

// Re-export commonly used types
pub use events::NormalizedEvent;
pub use hooks::{HookCallback, HookDecision, HookEvent, HookInput, HookMatcher, HookOutput};
pub use identifiers::{MessageId, RequestId, SessionId, ToolName};
pub use mcp::McpServerConfig;
pub use messages::{AssistantMessageContent, ContentBlock, Message};
pub use permissions::{AcknowledgedStatus, PermissionDecision, PermissionMode, PermissionVerdict};
pub use session::{DEFAULT_TOOLS, Session, SessionOptions, SessionStatus};
