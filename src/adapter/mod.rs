//! Agent execution adapter
//!
//! Owns one agent handle per session and turns each prompt into a stream of
//! [`NormalizedEvent`]s. In `default` permission mode every tool call is
//! routed through the [`PermissionBroker`] by a PreToolUse hook.

pub mod prompt;
pub mod stream;

use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{AgentBackend, AgentConfig, AgentHandle};
use crate::error::{GatewayError, Result};
use crate::hooks::{HookManager, HookMatcherBuilder};
use crate::permissions::{EventSink, PermissionBroker, PermissionPolicy};
use crate::types::{HookEvent, NormalizedEvent, SessionId, SessionOptions};

pub use prompt::{DEFAULT_SYSTEM_PROMPT, agent_config, system_prompt};
pub use stream::{STATEFUL_INPUT_TOOLS, Segmenter};

/// Stream of normalized events for one prompt
pub type EventStream = BoxStream<'static, NormalizedEvent>;

struct AgentEntry {
    handle: Arc<dyn AgentHandle>,
    config: AgentConfig,
}

/// One agent handle per session, plus the per-turn event translation
pub struct AgentAdapter {
    backend: Arc<dyn AgentBackend>,
    broker: Arc<PermissionBroker>,
    agents: RwLock<HashMap<SessionId, AgentEntry>>,
}

impl AgentAdapter {
    /// Create an adapter over `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn AgentBackend>, broker: Arc<PermissionBroker>) -> Self {
        Self {
            backend,
            broker,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Permission broker used by the session hooks
    #[must_use]
    pub fn broker(&self) -> &Arc<PermissionBroker> {
        &self.broker
    }

    /// Start the agent of a session
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the session already has an agent, or
    /// `AgentCreationFailed` if the backend cannot start one
    pub async fn start(&self, session_id: &SessionId, options: &SessionOptions) -> Result<()> {
        if self.has_session(session_id) {
            return Err(GatewayError::already_exists(session_id.as_str()));
        }

        let config = agent_config(session_id, options);
        log::info!(
            "Creating agent for session {session_id} with permission_mode: {}",
            config.permission_mode.as_str()
        );

        let hooks = self.permission_hooks(session_id, options);
        let handle = match self.backend.spawn(config.clone(), hooks).await {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to create agent for session {session_id}: {e}");
                return Err(GatewayError::agent_creation(e.to_string()));
            }
        };

        let raced = {
            let mut agents = self.agents.write();
            if agents.contains_key(session_id) {
                true
            } else {
                agents.insert(session_id.clone(), AgentEntry { handle: handle.clone(), config });
                false
            }
        };
        if raced {
            let _ = handle.close().await;
            return Err(GatewayError::already_exists(session_id.as_str()));
        }

        log::info!(
            "Created agent for session {session_id} ({} backend)",
            self.backend.name()
        );
        Ok(())
    }

    fn permission_hooks(&self, session_id: &SessionId, options: &SessionOptions) -> HookManager {
        let mut hooks = HookManager::new();
        if !options.permission_mode.is_interactive() {
            return hooks;
        }

        let broker = self.broker.clone();
        let policy = Arc::new(PermissionPolicy::new(
            options.permission_mode,
            &options.mcp_servers,
        ));
        let session = session_id.clone();
        let hook = HookManager::callback(move |input| {
            let broker = broker.clone();
            let policy = policy.clone();
            let session = session.clone();
            async move {
                let decision = broker.intercept(&session, &policy, input).await;
                Ok(decision.into_hook_output())
            }
        });
        hooks.register(
            HookEvent::PreToolUse,
            HookMatcherBuilder::new(Some("*")).add_hook(hook).build(),
        );
        log::info!("Session {session_id}: registered PreToolUse hook for permission handling");
        hooks
    }

    /// Send a prompt and stream normalized events.
    ///
    /// `sink` receives the permission events of this session until the
    /// returned stream ends or is dropped. Backend failures end the stream
    /// with a single `Error` event.
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session has no agent
    pub fn submit(
        &self,
        session_id: &SessionId,
        prompt: String,
        sink: EventSink,
    ) -> Result<EventStream> {
        let handle = self
            .agents
            .read()
            .get(session_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| GatewayError::session_not_found(session_id.as_str()))?;

        let preview: String = prompt.chars().take(50).collect();
        log::info!("Sending prompt to session {session_id}: {preview}...");

        self.broker.register_sink(session_id, sink.clone());
        let guard = SinkGuard {
            broker: self.broker.clone(),
            session_id: session_id.clone(),
            sink,
        };
        let session_id = session_id.clone();

        let stream = async_stream::stream! {
            let _guard = guard;
            yield NormalizedEvent::Thinking(true);

            let mut messages = match handle.query(prompt).await {
                Ok(messages) => messages,
                Err(e) => {
                    log::error!("Error sending prompt to session {session_id}: {e}");
                    yield NormalizedEvent::Error(format!("Failed to send prompt: {e}"));
                    return;
                }
            };

            let mut segmenter = Segmenter::new(session_id.clone());
            while let Some(item) = messages.next().await {
                match item {
                    Ok(message) => {
                        for event in segmenter.push(message) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        log::error!("Session {session_id}: error processing response: {e}");
                        yield NormalizedEvent::Error(GatewayError::stream_failure(e.to_string()).to_string());
                        return;
                    }
                }
            }

            for event in segmenter.finish() {
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Interrupt and close a session's agent, then drop its state.
    ///
    /// State is removed even if closing fails. Interrupting first stops a
    /// turn that is still streaming.
    ///
    /// # Returns
    /// `true` if an agent existed and closed cleanly
    pub async fn end(&self, session_id: &SessionId) -> bool {
        let Some(entry) = self.agents.write().remove(session_id) else {
            return false;
        };

        if let Err(e) = entry.handle.interrupt().await {
            log::debug!("Interrupt of session {session_id} failed: {e}");
        }
        match entry.handle.close().await {
            Ok(()) => {
                log::info!("Ended agent for session {session_id}");
                true
            }
            Err(e) => {
                log::error!("Error ending agent for session {session_id}: {e}");
                false
            }
        }
    }

    /// Close every agent
    ///
    /// # Returns
    /// Number of agents closed cleanly
    pub async fn end_all(&self) -> usize {
        let mut ended = 0;
        for session_id in self.active_sessions() {
            if self.end(&session_id).await {
                ended += 1;
            }
        }
        ended
    }

    /// Sessions with a live agent, sorted
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.agents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a session has a live agent
    #[must_use]
    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.agents.read().contains_key(session_id)
    }

    /// Launch configuration of a session's agent
    #[must_use]
    pub fn config(&self, session_id: &SessionId) -> Option<AgentConfig> {
        self.agents.read().get(session_id).map(|entry| entry.config.clone())
    }
}

/// Releases the permission sink when the prompt stream ends or is dropped
struct SinkGuard {
    broker: Arc<PermissionBroker>,
    session_id: SessionId,
    sink: EventSink,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.broker.release_sink(&self.session_id, &self.sink);
    }
}
