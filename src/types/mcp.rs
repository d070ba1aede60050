//! MCP (Model Context Protocol) server configuration types
//!
//! Sessions may attach external tool servers. Only `stdio` servers are
//! handed to the agent; every configured server, whatever its type, still
//! takes part in the permission policy through `require_permission`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const fn default_true() -> bool {
    true
}

fn default_server_type() -> String {
    "stdio".to_string()
}

/// External tool server attached to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name, the middle segment of `mcp__<server>__<tool>`
    pub name: String,
    /// Server type; only "stdio" is started
    #[serde(rename = "type", default = "default_server_type")]
    pub server_type: String,
    /// Command to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Command arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Whether tool calls on this server need user approval
    #[serde(default = "default_true")]
    pub require_permission: bool,
}

impl McpServerConfig {
    /// Create a stdio server configuration
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_type: default_server_type(),
            command: Some(command.into()),
            args: Vec::new(),
            env: HashMap::new(),
            require_permission: true,
        }
    }

    /// Set whether tool calls need approval
    #[must_use]
    pub const fn with_require_permission(mut self, require: bool) -> Self {
        self.require_permission = require;
        self
    }

    /// Whether this server can be launched by the agent
    #[must_use]
    pub fn is_launchable(&self) -> bool {
        self.server_type == "stdio" && self.command.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Serialize into the `mcpServers` entry understood by the agent CLI
    #[must_use]
    pub fn to_cli_value(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "type": "stdio",
            "command": self.command,
        });
        if !self.args.is_empty() {
            obj["args"] = serde_json::json!(self.args);
        }
        if !self.env.is_empty() {
            obj["env"] = serde_json::json!(self.env);
        }
        obj
    }
}
