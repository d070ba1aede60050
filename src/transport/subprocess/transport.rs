//! Subprocess transport implementation using the agent CLI

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::AgentConfig;
use crate::error::{GatewayError, Result};
use crate::transport::Transport;

use super::command::CommandBuilder;
use super::config::DEFAULT_MAX_BUFFER_SIZE;

/// Subprocess transport for the agent CLI
pub struct SubprocessTransport {
    pub(super) config: AgentConfig,
    pub(super) cli_path: PathBuf,
    pub(super) process: Option<Child>,
    pub(super) stdin: Option<ChildStdin>,
    pub(super) stdout: Option<BufReader<ChildStdout>>,
    pub(super) ready: Arc<AtomicBool>,
    pub(super) max_buffer_size: usize,
    pub(super) reader_task: Option<JoinHandle<()>>,
    pub(super) stderr_task: Option<JoinHandle<()>>,
}

impl SubprocessTransport {
    /// Create a new subprocess transport
    ///
    /// # Arguments
    /// * `config` - Agent launch configuration
    /// * `cli_path` - Optional path to the CLI (will search if None)
    ///
    /// # Errors
    /// Returns error if CLI cannot be found
    pub fn new(config: AgentConfig, cli_path: Option<PathBuf>) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => path,
            None => Self::find_cli()?,
        };

        Ok(Self {
            config,
            cli_path,
            process: None,
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            reader_task: None,
            stderr_task: None,
        })
    }

    /// Find the agent CLI binary
    ///
    /// # Errors
    /// Returns error if CLI cannot be found in PATH or common locations
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from(
            env::var("HOME").unwrap_or_else(|_| String::from("/root")),
        ));
        let locations = [
            home.join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            home.join(".local/bin/claude"),
            home.join(".claude/local/claude"),
            home.join("node_modules/.bin/claude"),
        ];

        locations
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(GatewayError::cli_not_found)
    }

    /// Path of the CLI binary this transport launches
    #[must_use]
    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    /// Arguments the CLI is launched with
    #[must_use]
    pub fn command_args(&self) -> Vec<String> {
        CommandBuilder::new(&self.cli_path, &self.config).args()
    }
}

impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_impl().await
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(GatewayError::transport("Transport is not ready for writing"));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| GatewayError::transport("stdin not available"))?;

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to write to stdin: {e}")))?;

        stdin
            .flush()
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to flush stdin: {e}")))?;

        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        self.read_messages_impl()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_impl().await
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
