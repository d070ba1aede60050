//! CLI command building logic for subprocess transport

use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

use crate::backend::AgentConfig;

/// Command builder for the agent CLI
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    config: &'a AgentConfig,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    #[must_use]
    pub const fn new(cli_path: &'a Path, config: &'a AgentConfig) -> Self {
        Self { cli_path, config }
    }

    /// Build the complete CLI command with all arguments
    #[must_use]
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);
        cmd.args(self.args());
        cmd
    }

    /// Arguments passed to the CLI, in order
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--print",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        args.push("--system-prompt".into());
        args.push(self.config.system_prompt.clone());

        if !self.config.allowed_tools.is_empty() {
            let tools: Vec<&str> = self.config.allowed_tools.iter().map(|t| t.as_str()).collect();
            args.push("--allowedTools".into());
            args.push(tools.join(","));
        }

        args.push("--permission-mode".into());
        args.push(self.config.permission_mode.as_str().into());

        self.add_mcp_args(&mut args);
        args
    }

    /// Add MCP server configuration
    fn add_mcp_args(&self, args: &mut Vec<String>) {
        let servers: HashMap<&str, serde_json::Value> = self
            .config
            .mcp_servers
            .iter()
            .filter(|s| s.is_launchable())
            .map(|s| (s.name.as_str(), s.to_cli_value()))
            .collect();

        if !servers.is_empty() {
            let config_json = serde_json::json!({ "mcpServers": servers });
            args.push("--mcp-config".into());
            args.push(config_json.to_string());
        }
    }
}
