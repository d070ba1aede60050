//! Backend running the agent CLI as a subprocess

use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::AgentClient;
use crate::error::Result;
use crate::hooks::HookManager;

use super::{AgentBackend, AgentConfig, AgentHandle, MessageStream};

/// Starts one CLI process per session
#[derive(Debug, Clone, Default)]
pub struct ClaudeCliBackend {
    cli_path: Option<PathBuf>,
}

impl ClaudeCliBackend {
    /// Create a backend; the CLI is searched on `PATH` when `cli_path` is `None`
    #[must_use]
    pub const fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }
}

impl AgentBackend for ClaudeCliBackend {
    fn spawn(
        &self,
        config: AgentConfig,
        hooks: HookManager,
    ) -> BoxFuture<'_, Result<Arc<dyn AgentHandle>>> {
        async move {
            let client = AgentClient::connect(config, hooks, self.cli_path.clone()).await?;
            Ok(Arc::new(client) as Arc<dyn AgentHandle>)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "claude-cli"
    }
}

impl AgentHandle for AgentClient {
    fn query(&self, prompt: String) -> BoxFuture<'_, Result<MessageStream>> {
        AgentClient::query(self, prompt).boxed()
    }

    fn interrupt(&self) -> BoxFuture<'_, Result<()>> {
        let result = AgentClient::interrupt(self);
        async move { result }.boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        AgentClient::close(self).boxed()
    }
}
