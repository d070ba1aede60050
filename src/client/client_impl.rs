//! `AgentClient` implementation
//!
//! Constructor and public API methods.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::backend::{AgentConfig, MessageStream};
use crate::control::ProtocolHandler;
use crate::error::{GatewayError, Result};
use crate::hooks::HookManager;
use crate::transport::{SubprocessTransport, Transport};
use crate::types::hooks::HookEvent;
use crate::types::identifiers::SessionId;

impl super::AgentClient {
    /// Start the agent process and its background tasks
    ///
    /// # Arguments
    /// * `config` - Agent launch configuration
    /// * `hooks` - Hooks answered on behalf of the CLI
    /// * `cli_path` - Optional path to the CLI (searched when `None`)
    ///
    /// # Errors
    /// Returns error if the CLI cannot be found or started
    pub async fn connect(
        config: AgentConfig,
        hooks: HookManager,
        cli_path: Option<PathBuf>,
    ) -> Result<Self> {
        let session_id = config.session_id.clone();
        let mut transport = SubprocessTransport::new(config, cli_path)?;
        transport.connect().await?;

        let mut protocol = ProtocolHandler::new();
        let (hook_tx, hook_rx) = mpsc::unbounded_channel();
        if hooks.has_hooks(HookEvent::PreToolUse) {
            protocol.set_hook_channel(hook_tx);
        }

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let transport = Arc::new(Mutex::new(transport));
        let protocol = Arc::new(protocol);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(Self::message_reader_task(
            transport.clone(),
            protocol.clone(),
            message_tx,
        )));
        tasks.push(tokio::spawn(Self::control_writer_task(
            transport.clone(),
            protocol.clone(),
            control_rx,
        )));
        tasks.push(tokio::spawn(Self::hook_handler_task(
            Arc::new(hooks),
            protocol.clone(),
            hook_rx,
            control_tx.clone(),
        )));

        Ok(Self {
            session_id,
            transport,
            protocol,
            message_rx: Arc::new(Mutex::new(message_rx)),
            control_tx,
            tasks: parking_lot::Mutex::new(tasks),
        })
    }

    /// Session served by this client
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Send a prompt and stream the reply up to the turn's result message
    ///
    /// # Errors
    /// Returns error if the prompt cannot be written
    pub async fn query(&self, prompt: String) -> Result<MessageStream> {
        let mut rx = self.message_rx.clone().lock_owned().await;

        let mut stale = 0usize;
        while rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            log::debug!(
                "Session {}: discarded {stale} message(s) left over from an abandoned turn",
                self.session_id
            );
        }

        let message = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": prompt
            }
        });
        let line = format!("{}\n", serde_json::to_string(&message)?);
        self.transport.lock().await.write(&line).await?;

        let stream = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                let last = match &item {
                    Ok(message) => message.is_result(),
                    Err(_) => true,
                };
                yield item;
                if last {
                    break;
                }
            }
        };
        Ok(Box::pin(stream))
    }

    /// Send an interrupt request
    ///
    /// # Errors
    /// Returns error if the control channel is closed
    pub fn interrupt(&self) -> Result<()> {
        let request = self.protocol.create_interrupt_request();
        self.control_tx
            .send(request)
            .map_err(|_| GatewayError::transport("Control channel closed"))
    }

    /// Stop background tasks and close the process
    ///
    /// # Errors
    /// Returns error if the process cannot be shut down cleanly
    pub async fn close(&self) -> Result<()> {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.transport.lock().await.close().await
    }
}

impl Drop for super::AgentClient {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
