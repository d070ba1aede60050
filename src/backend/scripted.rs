//! In-process backend replaying scripted turns
//!
//! Each `query` pops the next [`ScriptedTurn`] from a queue shared by every
//! handle of the backend; with the queue empty the agent echoes the prompt.
//! Tool-use blocks go through the registered PreToolUse hooks right after
//! they are yielded, the way the CLI asks before running a tool, so the
//! permission handshake can be driven without a subprocess.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::hooks::HookManager;
use crate::types::{ContentBlock, HookInput, Message, SessionId};

use super::{AgentBackend, AgentConfig, AgentHandle, MessageStream};

/// One step of a scripted turn
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield a raw message
    Message(Message),
    /// Fail the stream
    Fail(String),
    /// Pause before the next step
    Delay(Duration),
}

/// Scripted reply to one prompt
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    steps: Vec<ScriptStep>,
}

impl ScriptedTurn {
    /// Empty turn; produces only the result message
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assistant message with one text block
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.message(Message::assistant(vec![ContentBlock::text(text)]))
    }

    /// Assistant message with one tool-use block
    #[must_use]
    pub fn tool_use(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        self.message(Message::assistant(vec![ContentBlock::tool_use(id, name, input)]))
    }

    /// Any raw message
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.steps.push(ScriptStep::Message(message));
        self
    }

    /// Fail the turn at this point
    #[must_use]
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(error.into()));
        self
    }

    /// Pause at this point
    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(duration));
        self
    }
}

/// Outcome of one PreToolUse hook run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Session that ran the tool
    pub session_id: SessionId,
    /// Tool name
    pub tool: String,
    /// Whether the hooks let the tool run
    pub allowed: bool,
    /// Deny reason, if any
    pub reason: Option<String>,
}

#[derive(Default)]
struct Shared {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    spawned: Mutex<Vec<AgentConfig>>,
    outcomes: Mutex<Vec<ToolOutcome>>,
    prompts: Mutex<Vec<(SessionId, String)>>,
    closed: Mutex<Vec<SessionId>>,
    interrupted: Mutex<Vec<SessionId>>,
    fail_spawn: Mutex<Option<String>>,
}

/// Deterministic backend for tests and local runs
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    shared: Arc<Shared>,
}

impl ScriptedBackend {
    /// Backend with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn for the next prompt on any handle
    pub fn push_turn(&self, turn: ScriptedTurn) {
        self.shared.turns.lock().push_back(turn);
    }

    /// Make every following `spawn` fail with `error`
    pub fn fail_spawn(&self, error: impl Into<String>) {
        *self.shared.fail_spawn.lock() = Some(error.into());
    }

    /// Configurations of every spawned agent
    #[must_use]
    pub fn spawned(&self) -> Vec<AgentConfig> {
        self.shared.spawned.lock().clone()
    }

    /// Prompts received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<(SessionId, String)> {
        self.shared.prompts.lock().clone()
    }

    /// PreToolUse outcomes so far
    #[must_use]
    pub fn tool_outcomes(&self) -> Vec<ToolOutcome> {
        self.shared.outcomes.lock().clone()
    }

    /// Sessions whose handle was closed
    #[must_use]
    pub fn closed(&self) -> Vec<SessionId> {
        self.shared.closed.lock().clone()
    }

    /// Sessions whose handle was interrupted
    #[must_use]
    pub fn interrupted(&self) -> Vec<SessionId> {
        self.shared.interrupted.lock().clone()
    }
}

impl AgentBackend for ScriptedBackend {
    fn spawn(
        &self,
        config: AgentConfig,
        hooks: HookManager,
    ) -> BoxFuture<'_, Result<Arc<dyn AgentHandle>>> {
        async move {
            let spawn_error = self.shared.fail_spawn.lock().clone();
            if let Some(error) = spawn_error {
                return Err(GatewayError::connection(error));
            }
            log::debug!("Scripted agent started for session {}", config.session_id);
            self.shared.spawned.lock().push(config.clone());
            let handle = ScriptedHandle {
                session_id: config.session_id,
                hooks: Arc::new(hooks),
                shared: self.shared.clone(),
                turn_lock: Arc::new(tokio::sync::Mutex::new(())),
                closed: AtomicBool::new(false),
            };
            Ok(Arc::new(handle) as Arc<dyn AgentHandle>)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedHandle {
    session_id: SessionId,
    hooks: Arc<HookManager>,
    shared: Arc<Shared>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
    closed: AtomicBool,
}

impl ScriptedHandle {
    fn next_turn(&self, prompt: &str) -> ScriptedTurn {
        self.shared
            .turns
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptedTurn::new().text(format!("Echo: {prompt}")))
    }
}

impl AgentHandle for ScriptedHandle {
    fn query(&self, prompt: String) -> BoxFuture<'_, Result<MessageStream>> {
        async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(GatewayError::transport("Agent has been closed"));
            }
            let guard = self.turn_lock.clone().lock_owned().await;
            self.shared
                .prompts
                .lock()
                .push((self.session_id.clone(), prompt.clone()));

            let turn = self.next_turn(&prompt);
            let hooks = self.hooks.clone();
            let shared = self.shared.clone();
            let session_id = self.session_id.clone();

            let stream = async_stream::stream! {
                let _guard = guard;
                for step in turn.steps {
                    match step {
                        ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                        ScriptStep::Fail(error) => {
                            yield Err(GatewayError::connection(error));
                            return;
                        }
                        ScriptStep::Message(message) => {
                            let tool_calls = tool_calls(&message);
                            yield Ok(message);

                            for (id, name, input) in tool_calls {
                                let hook_input = HookInput::pre_tool_use(name.clone(), input, Some(id.clone()));
                                let output = match hooks.invoke(hook_input).await {
                                    Ok(output) => output,
                                    Err(e) => {
                                        yield Err(e);
                                        return;
                                    }
                                };
                                let allowed = !output.is_denied();
                                let reason = output.deny_reason().map(String::from);
                                shared.outcomes.lock().push(ToolOutcome {
                                    session_id: session_id.clone(),
                                    tool: name,
                                    allowed,
                                    reason: reason.clone(),
                                });
                                let content = if allowed {
                                    String::from("ok")
                                } else {
                                    reason.unwrap_or_else(|| String::from("denied"))
                                };
                                yield Ok(Message::User {
                                    message: serde_json::json!({
                                        "role": "user",
                                        "content": [{
                                            "type": "tool_result",
                                            "tool_use_id": id,
                                            "content": content,
                                            "is_error": !allowed,
                                        }]
                                    }),
                                });
                            }
                        }
                    }
                }
                yield Ok(Message::result_success());
            };
            Ok(Box::pin(stream) as MessageStream)
        }
        .boxed()
    }

    fn interrupt(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(GatewayError::transport("Agent has been closed"));
            }
            self.shared.interrupted.lock().push(self.session_id.clone());
            Ok(())
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.shared.closed.lock().push(self.session_id.clone());
            }
            Ok(())
        }
        .boxed()
    }
}

fn tool_calls(message: &Message) -> Vec<(String, String, serde_json::Value)> {
    let Message::Assistant { message, .. } = message else {
        return Vec::new();
    };
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.clone(), name.clone(), input.clone()))
            }
            _ => None,
        })
        .collect()
}
