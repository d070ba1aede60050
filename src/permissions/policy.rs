//! Which tool calls need client approval, and how to describe them

use std::collections::HashMap;

use crate::types::{McpServerConfig, PermissionMode};

/// Built-in tools that always ask
pub const GUARDED_TOOLS: &[&str] = &["Write", "Edit", "Bash"];

/// Prefix of externally registered tools (`mcp__<server>__<tool>`)
pub const MCP_TOOL_PREFIX: &str = "mcp__";

/// Split `mcp__<server>__<tool>` into `(server, tool)`.
///
/// The tool part may itself contain `__`.
#[must_use]
pub fn split_mcp_tool(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(MCP_TOOL_PREFIX)?;
    let (server, tool) = rest.split_once("__")?;
    if server.is_empty() {
        return None;
    }
    Some((server, tool))
}

/// Per-session permission policy snapshot
#[derive(Debug, Clone, Default)]
pub struct PermissionPolicy {
    mode: PermissionMode,
    mcp_servers: HashMap<String, bool>,
}

impl PermissionPolicy {
    /// Build a policy from the session's mode and external tool servers
    #[must_use]
    pub fn new(mode: PermissionMode, mcp_servers: &[McpServerConfig]) -> Self {
        Self {
            mode,
            mcp_servers: mcp_servers
                .iter()
                .map(|s| (s.name.clone(), s.require_permission))
                .collect(),
        }
    }

    /// Session permission mode
    #[must_use]
    pub const fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Whether calling `tool` must wait for the client.
    ///
    /// Unknown external servers and malformed external names fail towards
    /// asking.
    #[must_use]
    pub fn requires_permission(&self, tool: &str) -> bool {
        if !self.mode.is_interactive() {
            return false;
        }

        if GUARDED_TOOLS.contains(&tool) {
            return true;
        }

        if tool.starts_with(MCP_TOOL_PREFIX) {
            let Some((server, _)) = split_mcp_tool(tool) else {
                log::warn!("Malformed MCP tool name: {tool}");
                return true;
            };
            return self.mcp_servers.get(server).copied().unwrap_or_else(|| {
                log::debug!("MCP server '{server}' not configured, requiring permission");
                true
            });
        }

        false
    }
}

/// Human-readable summary of a tool call for the approval prompt
#[must_use]
pub fn describe(tool: &str, parameters: &serde_json::Value) -> String {
    let field = |key: &str, fallback: &'static str| -> String {
        parameters
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| fallback.to_string(), String::from)
    };

    match tool {
        "Write" => format!(
            "Agent wants to create or modify the file: {}",
            field("file_path", "unknown file")
        ),
        "Edit" => format!(
            "Agent wants to edit the file: {}",
            field("file_path", "unknown file")
        ),
        "Bash" => format!(
            "Agent wants to run the command: {}",
            field("command", "unknown command")
        ),
        _ if tool.starts_with(MCP_TOOL_PREFIX) => match split_mcp_tool(tool) {
            Some((server, name)) => format!(
                "Agent wants to use the '{name}' tool from the MCP server '{server}' with parameters: {parameters}"
            ),
            None => format!("Agent wants to use the MCP tool '{tool}' with parameters: {parameters}"),
        },
        _ => format!("Agent wants to use the {tool} tool with parameters: {parameters}"),
    }
}
