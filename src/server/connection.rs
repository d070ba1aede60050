//! Connection dispatcher
//!
//! One task per WebSocket reads frames and handles them in order. Prompts run
//! on a per-connection [`JoinSet`] instead, since a prompt may be waiting for
//! a `permission_response` that only this reader can receive. Every outbound
//! frame goes through a single writer task, which also sends the keepalive
//! pings.

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, Result};
use crate::lifecycle::Gateway;
use crate::permissions::event_sink;
use crate::protocol::{InboundFrame, OutboundFrame, parse_inbound, verdict};
use crate::registry::SessionUpdate;
use crate::storage::{MessageRecord, SessionRecord, SessionStore, USER_PROMPT_MESSAGE_ID};
use crate::types::{NormalizedEvent, SessionId, SessionOptions, SessionStatus};

use super::auth::{self, AUTH_CLOSE_REASON, Admission, POLICY_VIOLATION};

/// Lifecycle of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted
    Connecting,
    /// Waiting for credentials
    Authenticating,
    /// Dispatching frames
    Active,
    /// Waiting for in-flight prompts
    Closing,
    /// Writer stopped
    Closed,
}

enum Outgoing {
    Frame(OutboundFrame),
    Close(u16, &'static str),
}

/// Cloneable handle to the writer task
#[derive(Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Outbox {
    fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(Outgoing::Frame(frame))
            .map_err(|_| GatewayError::connection("WebSocket closed"))
    }

    fn close(&self, code: u16, reason: &'static str) {
        let _ = self.tx.send(Outgoing::Close(code, reason));
    }
}

type WsSink = SplitSink<WebSocket, WsMessage>;
type WsStream = SplitStream<WebSocket>;

/// Serve one upgraded socket until the client leaves or the gateway stops
pub async fn serve(socket: WebSocket, gateway: Arc<Gateway>, query_token: Option<String>) {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let closing = gateway.shutdown_token().child_token();
    let last_seen = Arc::new(Mutex::new(Instant::now()));

    let keepalive = Keepalive {
        interval: gateway.config().ws_ping_interval(),
        timeout: Duration::from_secs(gateway.config().ws_ping_timeout_secs),
        last_seen: last_seen.clone(),
    };
    let writer = tokio::spawn(write_loop(
        id.clone(),
        sink,
        rx,
        keepalive,
        closing.clone(),
    ));

    let mut conn = Connection {
        id,
        gateway,
        outbox: Outbox { tx },
        prompts: JoinSet::new(),
        in_flight: HashMap::new(),
        state: ConnectionState::Connecting,
    };
    log::info!("Client {}: WebSocket accepted", conn.id);

    conn.transition(ConnectionState::Authenticating);
    if conn
        .authenticate(&mut stream, query_token.as_deref(), &closing)
        .await
    {
        conn.transition(ConnectionState::Active);
        conn.read_loop(&mut stream, &closing, &last_seen).await;
    }

    conn.transition(ConnectionState::Closing);
    conn.drain_prompts().await;

    let Connection { id, outbox, .. } = conn;
    drop(outbox);
    closing.cancel();
    if let Err(e) = writer.await {
        log::debug!("Client {id}: writer task ended abnormally: {e}");
    }
    log::info!("Client {id}: {:?}", ConnectionState::Closed);
}

struct Connection {
    id: String,
    gateway: Arc<Gateway>,
    outbox: Outbox,
    prompts: JoinSet<SessionId>,
    /// Running prompt tasks per session
    in_flight: HashMap<SessionId, usize>,
    state: ConnectionState,
}

impl Connection {
    fn transition(&mut self, next: ConnectionState) {
        log::debug!("Client {}: {:?} -> {next:?}", self.id, self.state);
        self.state = next;
    }

    fn reply(&self, frame: OutboundFrame) {
        if let Err(e) = self.outbox.send(frame) {
            log::debug!("Client {}: reply dropped: {e}", self.id);
        }
    }

    async fn authenticate(
        &self,
        stream: &mut WsStream,
        query_token: Option<&str>,
        closing: &CancellationToken,
    ) -> bool {
        let config = self.gateway.config();
        let expected = match auth::admit(config.auth_enabled, self.gateway.api_key(), query_token)
        {
            Admission::Open => return true,
            Admission::Authenticated => {
                log::info!("Client {}: authenticated via query token", self.id);
                return true;
            }
            Admission::Refused => {
                self.outbox.close(POLICY_VIOLATION, AUTH_CLOSE_REASON);
                return false;
            }
            Admission::AwaitFrame { expected } => expected,
        };

        loop {
            let message = tokio::select! {
                () = closing.cancelled() => return false,
                message = stream.next() => message,
            };
            let text = match message {
                Some(Ok(WsMessage::Text(text))) => text,
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Binary(_))) => {
                    self.reject(auth::AuthError::NotAuthFrame);
                    return false;
                }
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => return false,
            };

            return match auth::check_auth_frame(expected, text.as_str()) {
                Ok(()) => {
                    log::info!("Client {}: authenticated via auth frame", self.id);
                    self.reply(OutboundFrame::AuthSuccess {});
                    true
                }
                Err(e) => {
                    self.reject(e);
                    false
                }
            };
        }
    }

    fn reject(&self, error: auth::AuthError) {
        log::warn!("Client {}: authentication failed: {error}", self.id);
        self.reply(OutboundFrame::error(error.to_string()));
        self.outbox.close(POLICY_VIOLATION, AUTH_CLOSE_REASON);
    }

    async fn read_loop(
        &mut self,
        stream: &mut WsStream,
        closing: &CancellationToken,
        last_seen: &Mutex<Instant>,
    ) {
        loop {
            let message = tokio::select! {
                () = closing.cancelled() => break,
                message = stream.next() => message,
            };
            *last_seen.lock() = Instant::now();

            match message {
                Some(Ok(WsMessage::Text(text))) => self.dispatch(text.as_str()).await,
                Some(Ok(WsMessage::Close(_))) | None => {
                    log::info!("Client {}: disconnected", self.id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("Client {}: WebSocket error: {e}", self.id);
                    break;
                }
            }

            while let Some(finished) = self.prompts.try_join_next() {
                self.finished(finished);
            }
        }
    }

    async fn dispatch(&mut self, text: &str) {
        let frame = match parse_inbound(text) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Client {}: {e}", self.id);
                self.reply(OutboundFrame::error(e.to_string()));
                return;
            }
        };
        log::debug!("Client {}: {} frame", self.id, frame.kind());

        match frame {
            InboundFrame::Auth { .. } => {
                log::debug!("Client {}: skipping auth frame, already authenticated", self.id);
            }
            InboundFrame::CreateSession {
                session_id,
                options,
            } => self.create_session(session_id, options).await,
            InboundFrame::SendPrompt { session_id, prompt } => {
                self.send_prompt(session_id, prompt).await;
            }
            InboundFrame::EndSession { session_id } => {
                if self.gateway.end_session(&session_id).await {
                    log::info!("Ended session {session_id}");
                    self.reply(OutboundFrame::SessionEnded { session_id });
                } else {
                    let error = GatewayError::session_not_found(session_id.as_str());
                    self.reply(OutboundFrame::error(error.to_string()));
                }
            }
            InboundFrame::ListSessions {} => {
                let sessions = self.gateway.registry().list().await;
                self.reply(OutboundFrame::SessionsList { sessions });
            }
            InboundFrame::KillAllAgents {} => {
                let (killed_count, sessions_ended) = self.gateway.kill_all_agents().await;
                self.reply(OutboundFrame::AgentsKilled {
                    killed_count,
                    sessions_ended,
                });
            }
            InboundFrame::PermissionResponse {
                session_id,
                request_id,
                approved,
                reason,
            } => {
                log::info!(
                    "Client {}: permission response {request_id} approved={approved}",
                    self.id
                );
                let resolved = self
                    .gateway
                    .broker()
                    .resolve(&request_id, verdict(approved, reason))
                    .await;
                if !resolved {
                    let message =
                        GatewayError::permission_not_found(request_id.as_str()).to_string();
                    self.reply(OutboundFrame::Error {
                        message,
                        session_id,
                        details: None,
                    });
                }
            }
            InboundFrame::Ping { timestamp } => {
                let _ = self.outbox.send(OutboundFrame::pong(timestamp));
            }
        }
    }

    async fn create_session(&self, session_id: Option<SessionId>, options: SessionOptions) {
        let registry = self.gateway.registry();
        let session = match registry.create(session_id, options) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Client {}: create_session rejected: {e}", self.id);
                self.reply(OutboundFrame::error(e.to_string()));
                return;
            }
        };

        if !self
            .gateway
            .store()
            .save_session(SessionRecord::from_session(&session))
            .await
        {
            log::warn!("Session {} was not persisted", session.id);
        }

        if let Err(e) = self
            .gateway
            .adapter()
            .start(&session.id, &session.options)
            .await
        {
            registry.end(&session.id).await;
            self.reply(OutboundFrame::error(format!("Failed to create session: {e}")));
            return;
        }

        log::info!("Client {}: session created: {}", self.id, session.id);
        self.reply(OutboundFrame::SessionCreated {
            session_id: session.id.clone(),
            session,
        });
    }

    async fn send_prompt(&mut self, session_id: SessionId, prompt: String) {
        let Some(session) = self.gateway.registry().get(&session_id).await else {
            log::warn!("Client {}: session {session_id} not found", self.id);
            let error = GatewayError::session_not_found(session_id.as_str());
            self.reply(OutboundFrame::session_error(&session_id, error.to_string()));
            return;
        };

        let task = PromptTask {
            gateway: self.gateway.clone(),
            outbox: self.outbox.clone(),
            session_id,
            options: session.options,
        };
        *self.in_flight.entry(task.session_id.clone()).or_default() += 1;
        self.prompts.spawn(task.run(prompt));
        log::debug!(
            "Client {}: prompt task started ({} in flight)",
            self.id,
            self.prompts.len()
        );
    }

    fn finished(&mut self, result: std::result::Result<SessionId, tokio::task::JoinError>) {
        match result {
            Ok(session_id) => {
                if let Some(count) = self.in_flight.get_mut(&session_id) {
                    *count -= 1;
                    if *count == 0 {
                        self.in_flight.remove(&session_id);
                    }
                }
            }
            Err(e) => log::error!("Client {}: prompt task failed: {e}", self.id),
        }
    }

    async fn drain_prompts(&mut self) {
        if self.prompts.is_empty() {
            return;
        }
        log::info!(
            "Client {}: waiting for {} pending prompt(s)",
            self.id,
            self.prompts.len()
        );

        // Nobody is left to answer their permission requests
        let broker = self.gateway.broker().clone();
        for session_id in self.in_flight.keys() {
            let denied = broker.cancel_session(session_id);
            if denied > 0 {
                log::info!(
                    "Client {}: denied {denied} pending permission(s) of session {session_id}",
                    self.id
                );
            }
        }

        while let Some(finished) = self.prompts.join_next().await {
            self.finished(finished);
        }
    }
}

/// One prompt, from the stored user message to the final status update
struct PromptTask {
    gateway: Arc<Gateway>,
    outbox: Outbox,
    session_id: SessionId,
    options: SessionOptions,
}

impl PromptTask {
    async fn run(self, prompt: String) -> SessionId {
        let session_id = self.session_id.clone();
        let registry = self.gateway.registry().clone();

        match self.stream(prompt).await {
            Ok(None) => {
                registry
                    .update(&session_id, SessionUpdate::status(SessionStatus::Idle))
                    .await;
            }
            Ok(Some(failure)) => {
                registry
                    .update(&session_id, SessionUpdate::failed(failure))
                    .await;
            }
            Err(e) if e.is_client_error() => {
                log::warn!("Session {session_id}: prompt rejected: {e}");
                let _ = self
                    .outbox
                    .send(OutboundFrame::session_error(&session_id, e.to_string()));
            }
            Err(e) => {
                log::error!("Session {session_id}: error processing prompt: {e}");
                registry
                    .update(&session_id, SessionUpdate::failed(e.to_string()))
                    .await;
                let _ = self.outbox.send(OutboundFrame::session_error(
                    &session_id,
                    format!("Error processing prompt: {e}"),
                ));
            }
        }
        session_id
    }

    /// Drive the adapter stream; returns the text of a streamed error event
    async fn stream(&self, prompt: String) -> Result<Option<String>> {
        let gateway = &self.gateway;
        let session_id = &self.session_id;
        let store = gateway.store().clone();

        if !store
            .save_message(
                session_id.clone(),
                MessageRecord::text(USER_PROMPT_MESSAGE_ID, "user", prompt.clone()),
            )
            .await
        {
            log::warn!("Session {session_id}: prompt was not persisted");
        }

        // The session may have ended or been reaped since the frame was read
        let registry = gateway.registry();
        if registry
            .update(session_id, SessionUpdate::status(SessionStatus::Processing))
            .await
            .is_none()
            || registry.increment_message_count(session_id).await.is_none()
        {
            return Err(GatewayError::session_not_found(session_id.as_str()));
        }

        let adapter = gateway.adapter();
        if !adapter.has_session(session_id) {
            log::info!("Session {session_id}: starting agent on first prompt");
            match adapter.start(session_id, &self.options).await {
                Ok(()) | Err(GatewayError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
            // An agent must not outlive its registry record
            if !registry.contains(session_id) {
                adapter.end(session_id).await;
                return Err(GatewayError::session_not_found(session_id.as_str()));
            }
        }

        let outbox = self.outbox.clone();
        let sink_session = session_id.clone();
        let sink = event_sink(move |event| {
            let sent = outbox.send(OutboundFrame::from_event(&sink_session, event));
            async move { sent }
        });

        let mut events = adapter.submit(session_id, prompt, sink)?;
        let mut journal = TurnJournal::new(store, session_id.clone());
        let mut failure = None;

        while let Some(event) = events.next().await {
            journal.record(&event).await;
            if let NormalizedEvent::Error(message) = &event {
                failure = Some(message.clone());
            }
            if self
                .outbox
                .send(OutboundFrame::from_event(session_id, event))
                .is_err()
            {
                log::debug!("Session {session_id}: client gone, draining response");
            }
        }

        log::info!(
            "Session {session_id}: response stream complete ({} events)",
            journal.events
        );
        Ok(failure)
    }
}

/// Persists the text and tool events of one prompt, each at most once
struct TurnJournal {
    store: Arc<dyn SessionStore>,
    session_id: SessionId,
    seen: HashSet<u64>,
    events: usize,
}

impl TurnJournal {
    fn new(store: Arc<dyn SessionStore>, session_id: SessionId) -> Self {
        Self {
            store,
            session_id,
            seen: HashSet::new(),
            events: 0,
        }
    }

    fn fingerprint(key: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    async fn record(&mut self, event: &NormalizedEvent) {
        self.events += 1;
        let record = match event {
            NormalizedEvent::Message { content, .. } => {
                if !self.seen.insert(Self::fingerprint(&format!("assistant:{content}"))) {
                    log::debug!("Session {}: duplicate message not stored", self.session_id);
                    return;
                }
                MessageRecord::text(format!("msg-{}", self.events), "assistant", content.clone())
            }
            NormalizedEvent::ToolUse {
                tool, tool_use_id, ..
            } => {
                let key = format!("assistant:Using tool: {tool}:{tool_use_id}");
                if !self.seen.insert(Self::fingerprint(&key)) {
                    log::debug!("Session {}: duplicate tool use not stored", self.session_id);
                    return;
                }
                MessageRecord::tool_use(tool_use_id.clone(), tool.as_str())
            }
            _ => return,
        };

        let message_id = record.message_id.clone();
        if !self.store.save_message(self.session_id.clone(), record).await {
            log::warn!("Session {}: message {message_id} was not persisted", self.session_id);
        }
    }
}

struct Keepalive {
    interval: Duration,
    timeout: Duration,
    last_seen: Arc<Mutex<Instant>>,
}

async fn write_loop(
    id: String,
    mut sink: WsSink,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    keepalive: Keepalive,
    closing: CancellationToken,
) {
    let mut ticker = tokio::time::interval(keepalive.interval);
    ticker.tick().await;

    loop {
        let outgoing = tokio::select! {
            outgoing = rx.recv() => outgoing,
            _ = ticker.tick() => {
                let idle = keepalive.last_seen.lock().elapsed();
                if idle > keepalive.interval + keepalive.timeout {
                    log::warn!("Client {id}: no traffic for {}s, closing", idle.as_secs());
                    closing.cancel();
                    break;
                }
                if sink.send(WsMessage::Ping(Default::default())).await.is_err() {
                    break;
                }
                continue;
            }
            () = closing.cancelled() => {
                // Flush what is already queued
                while let Ok(outgoing) = rx.try_recv() {
                    if !deliver(&mut sink, outgoing).await {
                        break;
                    }
                }
                break;
            }
        };

        match outgoing {
            Some(outgoing) => {
                if !deliver(&mut sink, outgoing).await {
                    closing.cancel();
                    break;
                }
            }
            None => break,
        }
    }

    let _ = sink.close().await;
}

/// Send one outgoing item; `false` once the socket should stop
async fn deliver(sink: &mut WsSink, outgoing: Outgoing) -> bool {
    match outgoing {
        Outgoing::Frame(frame) => match frame.to_text() {
            Ok(text) => sink.send(WsMessage::Text(text.into())).await.is_ok(),
            Err(e) => {
                log::error!("Failed to serialize {} frame: {e}", frame.kind());
                true
            }
        },
        Outgoing::Close(code, reason) => {
            let close = CloseFrame {
                code,
                reason: reason.into(),
            };
            let _ = sink.send(WsMessage::Close(Some(close))).await;
            false
        }
    }
}
