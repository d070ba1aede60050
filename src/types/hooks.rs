//! Hook-related type definitions
//!
//! This module contains types for managing hooks, including hook events,
//! hook inputs, hook outputs, and hook callbacks.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

// ============================================================================
// Hook Types
// ============================================================================

/// Hook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    /// Before a tool is used
    PreToolUse,
    /// After a tool is used
    PostToolUse,
    /// When user submits a prompt
    UserPromptSubmit,
    /// When conversation stops
    Stop,
}

/// Hook decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    /// Block the action
    Block,
}

/// Hook output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookOutput {
    /// Decision to block or allow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<HookDecision>,
    /// System message to add
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
    /// Hook-specific output data
    #[serde(skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<serde_json::Value>,
}

impl HookOutput {
    /// Whether a PreToolUse hook denied the call
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self.decision, Some(HookDecision::Block))
            || self
                .hook_specific_output
                .as_ref()
                .and_then(|v| v.get("permissionDecision"))
                .and_then(serde_json::Value::as_str)
                == Some("deny")
    }

    /// Deny reason carried in `hookSpecificOutput`
    #[must_use]
    pub fn deny_reason(&self) -> Option<&str> {
        self.hook_specific_output
            .as_ref()
            .and_then(|v| v.get("permissionDecisionReason"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Tool call details handed to a hook
#[derive(Debug, Clone, PartialEq)]
pub struct HookInput {
    /// Event that fired
    pub event: HookEvent,
    /// Tool name for tool events
    pub tool_name: Option<String>,
    /// Tool parameters
    pub tool_input: serde_json::Value,
    /// Agent-side correlation token of the tool call
    pub tool_use_id: Option<String>,
}

impl HookInput {
    /// Build a PreToolUse input
    pub fn pre_tool_use(
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        tool_use_id: Option<String>,
    ) -> Self {
        Self {
            event: HookEvent::PreToolUse,
            tool_name: Some(tool_name.into()),
            tool_input,
            tool_use_id,
        }
    }

    /// Extract hook input from a raw CLI event payload.
    ///
    /// Accepts both camelCase and snake_case keys.
    #[must_use]
    pub fn from_event_data(event: HookEvent, data: &serde_json::Value) -> Self {
        let field = |camel: &str, snake: &str| data.get(camel).or_else(|| data.get(snake)).cloned();

        Self {
            event,
            tool_name: field("toolName", "tool_name")
                .and_then(|v| v.as_str().map(String::from)),
            tool_input: field("toolInput", "tool_input").unwrap_or_else(|| serde_json::json!({})),
            tool_use_id: field("toolUseId", "tool_use_id")
                .and_then(|v| v.as_str().map(String::from)),
        }
    }
}

/// Hook callback type
pub type HookCallback =
    Arc<dyn Fn(HookInput) -> Pin<Box<dyn Future<Output = Result<HookOutput>> + Send>> + Send + Sync>;

/// Hook matcher configuration
#[derive(Clone)]
pub struct HookMatcher {
    /// Matcher pattern (e.g., tool name like "Bash" or pattern like "Write|Edit")
    pub matcher: Option<String>,
    /// List of hook callbacks
    pub hooks: Vec<HookCallback>,
}

impl std::fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .field("hooks", &format!("[{} callbacks]", self.hooks.len()))
            .finish()
    }
}
