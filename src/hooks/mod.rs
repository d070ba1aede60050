//! Hook system for intercepting agent events
//!
//! Backends call [`HookManager::invoke`] when the agent is about to act; the
//! adapter registers a PreToolUse hook here that routes tool calls through
//! the permission broker.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::types::hooks::{
    HookCallback, HookDecision, HookEvent, HookInput, HookMatcher, HookOutput,
};

/// Hook manager for registering and invoking hooks
#[derive(Clone, Default)]
pub struct HookManager {
    /// Registered hook matchers per event
    matchers: HashMap<HookEvent, Vec<HookMatcher>>,
}

impl HookManager {
    /// Create a new hook manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from a per-event matcher table
    #[must_use]
    pub fn from_config(config: HashMap<HookEvent, Vec<HookMatcher>>) -> Self {
        Self { matchers: config }
    }

    /// Register a hook for an event
    pub fn register(&mut self, event: HookEvent, matcher: HookMatcher) {
        self.matchers.entry(event).or_default().push(matcher);
    }

    /// Whether any hook is registered for `event`
    #[must_use]
    pub fn has_hooks(&self, event: HookEvent) -> bool {
        self.matchers.get(&event).is_some_and(|m| !m.is_empty())
    }

    /// Invoke hooks for a given event
    ///
    /// Outputs of matching hooks are merged in registration order; a `Block`
    /// decision or a PreToolUse deny stops further hooks.
    ///
    /// # Errors
    /// Returns error if hook callback execution fails
    pub async fn invoke(&self, input: HookInput) -> Result<HookOutput> {
        let mut output = HookOutput::default();
        let Some(matchers) = self.matchers.get(&input.event) else {
            return Ok(output);
        };

        for matcher in matchers {
            if !Self::matches(matcher.matcher.as_deref(), input.tool_name.as_deref()) {
                continue;
            }

            for hook in &matcher.hooks {
                let result = hook(input.clone()).await?;

                if result.decision.is_some() {
                    output.decision = result.decision;
                }
                if result.system_message.is_some() {
                    output.system_message = result.system_message;
                }
                if result.hook_specific_output.is_some() {
                    output.hook_specific_output = result.hook_specific_output;
                }

                if matches!(output.decision, Some(HookDecision::Block)) || output.is_denied() {
                    return Ok(output);
                }
            }
        }

        Ok(output)
    }

    /// Check if a matcher matches a tool name
    ///
    /// `None` and `"*"` match everything; otherwise the pattern is an exact
    /// name or pipe-separated alternatives.
    ///
    /// # Examples
    /// ```
    /// use agent_gateway::hooks::HookManager;
    ///
    /// assert!(HookManager::matches(Some("*"), Some("tool")));
    /// assert!(HookManager::matches(Some("Bash"), Some("Bash")));
    /// assert!(HookManager::matches(Some("Read|Write"), Some("Write")));
    /// assert!(!HookManager::matches(Some("Read"), None));
    /// ```
    #[must_use]
    pub fn matches(matcher: Option<&str>, tool_name: Option<&str>) -> bool {
        match (matcher, tool_name) {
            (None, _) | (Some("*"), _) => true,
            (Some(pattern), Some(name)) => pattern.split('|').any(|p| p == name),
            (Some(_), None) => false,
        }
    }

    /// Create a hook callback from a closure
    pub fn callback<F, Fut>(f: F) -> HookCallback
    where
        F: Fn(HookInput) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HookOutput>> + Send + 'static,
    {
        Arc::new(move |input| Box::pin(f(input)))
    }
}

/// Builder for creating hook matchers
pub struct HookMatcherBuilder {
    matcher: Option<String>,
    hooks: Vec<HookCallback>,
}

impl HookMatcherBuilder {
    /// Create a new hook matcher builder
    ///
    /// # Arguments
    /// * `pattern` - Matcher pattern (None for all, or specific tool name/pattern)
    pub fn new(pattern: Option<impl Into<String>>) -> Self {
        Self {
            matcher: pattern.map(Into::into),
            hooks: Vec::new(),
        }
    }

    /// Add a hook callback
    #[must_use]
    pub fn add_hook(mut self, hook: HookCallback) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the hook matcher
    #[must_use]
    pub fn build(self) -> HookMatcher {
        HookMatcher {
            matcher: self.matcher,
            hooks: self.hooks,
        }
    }
}
