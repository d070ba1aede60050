//! Message reading logic for subprocess transport

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::error::{GatewayError, Result};

use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Read JSON values from the CLI's stdout on a background task.
    ///
    /// A value may span several lines; lines are accumulated until they parse.
    /// Sessions stay open between prompts, so reads have no idle timeout.
    pub(super) fn read_messages_impl(
        &mut self,
    ) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout = self.stdout.take();
        let max_buffer_size = self.max_buffer_size;
        let session_id = self.config.session_id.clone();

        let task = tokio::spawn(async move {
            let Some(mut stdout) = stdout else {
                let _ = tx.send(Err(GatewayError::connection(
                    "Not connected - stdout not available",
                )));
                return;
            };
            let mut json_buffer = String::new();
            let mut line = String::new();

            loop {
                line.clear();
                match stdout.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        json_buffer.push_str(trimmed);

                        if json_buffer.len() > max_buffer_size {
                            json_buffer.clear();
                            let _ = tx.send(Err(GatewayError::transport(format!(
                                "JSON message exceeded maximum buffer size of {max_buffer_size} bytes"
                            ))));
                            continue;
                        }

                        if let Ok(data) = serde_json::from_str::<serde_json::Value>(&json_buffer) {
                            json_buffer.clear();
                            if tx.send(Ok(data)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(GatewayError::Io(e)));
                        break;
                    }
                }
            }

            log::debug!("Agent output for session {session_id} closed");
            let _ = tx.send(Err(GatewayError::connection("Agent process closed its output")));
        });

        self.reader_task = Some(task);
        rx
    }
}
