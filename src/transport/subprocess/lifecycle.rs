//! Lifecycle management for subprocess transport (connect, close)

use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::VERSION;
use crate::error::{GatewayError, Result};

use super::command::CommandBuilder;
use super::config::{DANGEROUS_ENV_VARS, EXIT_GRACE_SECS};
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the CLI process and wire up its stdio pipes
    ///
    /// # Errors
    /// Returns error if process spawning fails or stdio handles cannot be obtained
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let mut cmd = CommandBuilder::new(&self.cli_path, &self.config).build();

        for (key, value) in &self.config.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Dropping environment override {key} for agent process");
            } else {
                cmd.env(key, value);
            }
        }
        cmd.env("CLAUDE_CODE_ENTRYPOINT", "agent-gateway");
        cmd.env("AGENT_GATEWAY_VERSION", VERSION);

        if let Some(ref cwd) = self.config.cwd {
            if !cwd.exists() {
                return Err(GatewayError::connection(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                )));
            }
            cmd.env("PWD", cwd);
            cmd.current_dir(cwd);
        }

        // stderr is piped so the child never touches the gateway's terminal
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| GatewayError::connection(format!("Failed to start Claude Code: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::connection("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::connection("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GatewayError::connection("Failed to get stderr handle"))?;

        let session_id = self.config.session_id.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("[agent {session_id}] {line}");
            }
        });

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.process = Some(child);
        self.stderr_task = Some(stderr_task);
        self.ready.store(true, Ordering::SeqCst);

        log::info!(
            "Started agent process for session {} ({})",
            self.config.session_id,
            self.cli_path.display()
        );
        Ok(())
    }

    /// Close the transport and clean up resources
    ///
    /// # Errors
    /// Returns error if waiting on the process fails
    pub(super) async fn close_impl(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.stdout = None;

        if let Some(mut child) = self.process.take() {
            match tokio::time::timeout(Duration::from_secs(EXIT_GRACE_SECS), child.wait()).await {
                Ok(Ok(status)) => log::debug!("Agent process exited with {status}"),
                Ok(Err(e)) => return Err(GatewayError::Io(e)),
                Err(_) => {
                    log::warn!("Agent process did not exit in time, killing it");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        Ok(())
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        self.stdin.take();

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
    }
}
