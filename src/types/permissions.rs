//! Permission-related type definitions
//!
//! This module contains the permission mode of a session, the verdict a
//! client gives for one tool call, and the decision handed back to the
//! agent's pre-tool hook.

use serde::{Deserialize, Serialize};

use super::hooks::HookOutput;

// ============================================================================
// Permission Types
// ============================================================================

/// Permission modes for tool execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask the client before dangerous tools run
    #[default]
    Default,
    /// Auto-accept file edits
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools (use with caution)
    BypassPermissions,
}

impl PermissionMode {
    /// Flag value understood by the agent CLI
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }

    /// Whether tool calls are routed through the permission broker
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Default)
    }
}

/// Client verdict for one pending request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionVerdict {
    /// Whether the tool may run
    pub approved: bool,
    /// Optional reason given by the client
    pub reason: Option<String>,
}

/// Status reported in `permission_acknowledged`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgedStatus {
    /// Approved, the tool runs now
    Executing,
    /// Denied by the client
    Denied,
    /// No answer arrived in time
    TimedOut,
}

/// Outcome of intercepting one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Let the tool run
    Allow,
    /// Block the tool with a reason shown to the agent
    Deny {
        /// Reason string
        reason: String,
    },
}

/// Reason used when the client rejects a request
pub const DENY_USER: &str = "User denied permission";
/// Reason used when the client never answers
pub const DENY_TIMEOUT: &str = "Permission request timed out";
/// Reason used when no connection can be asked
pub const DENY_NO_CHANNEL: &str = "No permission callback registered";
/// Reason used when the owning session goes away
pub const DENY_SESSION_ENDED: &str = "Session ended";

impl PermissionDecision {
    /// Create a deny decision
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Whether the tool may run
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Deny reason, if any
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason } => Some(reason),
        }
    }

    /// Convert into the shape a PreToolUse hook returns.
    ///
    /// Allow is an empty output; deny fills `hookSpecificOutput`.
    #[must_use]
    pub fn into_hook_output(self) -> HookOutput {
        match self {
            Self::Allow => HookOutput::default(),
            Self::Deny { reason } => HookOutput {
                hook_specific_output: Some(serde_json::json!({
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "deny",
                    "permissionDecisionReason": reason,
                })),
                ..HookOutput::default()
            },
        }
    }
}
