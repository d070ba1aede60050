//! System prompt and launch configuration of a session's agent

use crate::backend::AgentConfig;
use crate::types::{SessionId, SessionOptions};

/// Prompt used when the session does not bring one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Full system prompt for a session.
///
/// Resumed sessions get the prior transcript and the working directory
/// appended so the agent picks up where the conversation stopped.
#[must_use]
pub fn system_prompt(options: &SessionOptions) -> String {
    let base = options
        .system_prompt
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let Some(history) = options.conversation_history.as_deref().filter(|h| !h.is_empty()) else {
        return base.to_string();
    };

    let working_directory = options
        .working_directory
        .as_ref()
        .map_or_else(|| String::from("Not specified"), |d| d.display().to_string());

    format!(
        "\n{base}\n\n\
         You are resuming an existing coding session.\n\
         Working Directory: {working_directory}\n\n\
         Recent conversation context:\n\
         {history}\n\n\
         Continue helping the user from where they left off. You have access to the project files and can use tools as needed.\n"
    )
}

/// Launch configuration derived from session options
#[must_use]
pub fn agent_config(session_id: &SessionId, options: &SessionOptions) -> AgentConfig {
    let mut config = AgentConfig::new(session_id.clone());
    config.system_prompt = system_prompt(options);
    config.allowed_tools = options.tools.clone();
    config.cwd = options.working_directory.clone();
    config.permission_mode = options.permission_mode;
    config.mcp_servers = options
        .mcp_servers
        .iter()
        .filter(|server| {
            let launchable = server.is_launchable();
            if !launchable {
                log::warn!(
                    "Session {session_id}: skipping MCP server '{}' of type '{}'",
                    server.name,
                    server.server_type
                );
            }
            launchable
        })
        .cloned()
        .collect();
    config
}
