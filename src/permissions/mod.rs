//! Permission broker
//!
//! Mediates approval of tool calls. When the agent's pre-tool hook fires for
//! a guarded tool, [`PermissionBroker::intercept`] records a pending request,
//! asks the client through the session's event sink and suspends until the
//! client answers through [`PermissionBroker::resolve`] or the timeout fires.
//!
//! Pending metadata and the resolution senders live in one table behind a
//! short synchronous lock, so a request and its future are always created and
//! removed together. Whoever removes the sender first owns the outcome: a
//! late `resolve` after a timeout, or a timeout racing a `resolve`, is a
//! harmless no-op on the losing side.

pub mod policy;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::types::permissions::{DENY_NO_CHANNEL, DENY_SESSION_ENDED, DENY_TIMEOUT, DENY_USER};
use crate::types::{
    AcknowledgedStatus, HookInput, NormalizedEvent, PermissionDecision, PermissionVerdict,
    RequestId, SessionId, ToolName,
};

pub use policy::{PermissionPolicy, describe};

/// Default wait for a client decision
pub const DEFAULT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback that delivers events to the connection owning a session
pub type EventSink =
    Arc<dyn Fn(NormalizedEvent) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Create an event sink from a closure
pub fn event_sink<F, Fut>(f: F) -> EventSink
where
    F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Tool call waiting for the client
#[derive(Clone)]
pub struct PendingPermission {
    /// Request identifier
    pub request_id: RequestId,
    /// Owning session
    pub session_id: SessionId,
    /// Tool name
    pub tool: ToolName,
    /// Tool parameters
    pub parameters: serde_json::Value,
    /// Agent-side correlation token
    pub tool_use_id: Option<String>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    sink: EventSink,
}

impl std::fmt::Debug for PendingPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingPermission")
            .field("request_id", &self.request_id)
            .field("session_id", &self.session_id)
            .field("tool", &self.tool)
            .field("tool_use_id", &self.tool_use_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

enum Resolution {
    Client(PermissionVerdict),
    Cancelled,
}

#[derive(Default)]
struct PendingTable {
    requests: HashMap<SessionId, HashMap<RequestId, PendingPermission>>,
    futures: HashMap<RequestId, oneshot::Sender<Resolution>>,
}

impl PendingTable {
    fn insert(&mut self, pending: PendingPermission, tx: oneshot::Sender<Resolution>) {
        self.futures.insert(pending.request_id.clone(), tx);
        self.requests
            .entry(pending.session_id.clone())
            .or_default()
            .insert(pending.request_id.clone(), pending);
    }

    /// Remove a request and its future together
    fn take(
        &mut self,
        request_id: &RequestId,
    ) -> Option<(oneshot::Sender<Resolution>, Option<PendingPermission>)> {
        let tx = self.futures.remove(request_id)?;

        let mut pending = None;
        self.requests.retain(|_, by_request| {
            if pending.is_none() {
                pending = by_request.remove(request_id);
            }
            !by_request.is_empty()
        });

        Some((tx, pending))
    }

    fn take_session(&mut self, session_id: &SessionId) -> Vec<oneshot::Sender<Resolution>> {
        let Some(by_request) = self.requests.remove(session_id) else {
            return Vec::new();
        };
        by_request
            .keys()
            .filter_map(|id| self.futures.remove(id))
            .collect()
    }
}

/// Broker between agent pre-tool hooks and client approvals
pub struct PermissionBroker {
    timeout: Duration,
    sinks: Mutex<HashMap<SessionId, EventSink>>,
    table: Mutex<PendingTable>,
}

impl PermissionBroker {
    /// Create a broker with the given decision timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sinks: Mutex::new(HashMap::new()),
            table: Mutex::new(PendingTable::default()),
        }
    }

    /// Decision timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Route permission events of `session_id` to `sink`
    pub fn register_sink(&self, session_id: &SessionId, sink: EventSink) {
        self.sinks.lock().insert(session_id.clone(), sink);
    }

    /// Stop routing permission events of `session_id` if `sink` is still the
    /// registered one; a newer registration is left in place
    pub fn release_sink(&self, session_id: &SessionId, sink: &EventSink) {
        let mut sinks = self.sinks.lock();
        if sinks.get(session_id).is_some_and(|current| Arc::ptr_eq(current, sink)) {
            sinks.remove(session_id);
        }
    }

    /// Whether a sink is registered for `session_id`
    #[must_use]
    pub fn has_sink(&self, session_id: &SessionId) -> bool {
        self.sinks.lock().contains_key(session_id)
    }

    /// Number of unresolved requests
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table.lock().futures.len()
    }

    /// Snapshot of the unresolved requests of one session
    #[must_use]
    pub fn pending_for(&self, session_id: &SessionId) -> Vec<PendingPermission> {
        self.table
            .lock()
            .requests
            .get(session_id)
            .map(|by_request| by_request.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Gate one tool call on client approval.
    ///
    /// # Arguments
    /// * `session_id` - Session the agent belongs to
    /// * `policy` - Permission policy of that session
    /// * `input` - Tool call reported by the pre-tool hook
    ///
    /// # Returns
    /// `Allow` when no approval is needed or the client approved; otherwise
    /// `Deny` with the reason shown to the agent
    pub async fn intercept(
        &self,
        session_id: &SessionId,
        policy: &PermissionPolicy,
        input: HookInput,
    ) -> PermissionDecision {
        let tool = ToolName::new(input.tool_name.unwrap_or_default());
        if !policy.requires_permission(tool.as_str()) {
            log::debug!("Session {session_id}: {tool} does not require permission");
            return PermissionDecision::Allow;
        }

        let Some(sink) = self.sinks.lock().get(session_id).cloned() else {
            log::warn!("Session {session_id}: no permission sink for {tool}, denying");
            return PermissionDecision::deny(DENY_NO_CHANNEL);
        };

        let request_id = RequestId::generate();
        let (tx, mut rx) = oneshot::channel();
        let pending = PendingPermission {
            request_id: request_id.clone(),
            session_id: session_id.clone(),
            tool: tool.clone(),
            parameters: input.tool_input.clone(),
            tool_use_id: input.tool_use_id,
            created_at: Utc::now(),
            sink: sink.clone(),
        };
        self.table.lock().insert(pending, tx);

        let request = NormalizedEvent::PermissionRequest {
            request_id: request_id.clone(),
            tool: tool.clone(),
            description: describe(tool.as_str(), &input.tool_input),
            parameters: input.tool_input,
        };
        if let Err(e) = sink(request).await {
            log::warn!("Session {session_id}: failed to send permission request {request_id}: {e}");
            self.table.lock().take(&request_id);
            return PermissionDecision::deny(DENY_NO_CHANNEL);
        }
        log::info!("Session {session_id}: waiting for permission {request_id} ({tool})");

        let resolution = match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(resolution) => resolution.ok(),
            Err(_) => {
                if self.table.lock().take(&request_id).is_some() {
                    log::warn!("Session {session_id}: permission {request_id} timed out");
                    let ack = NormalizedEvent::PermissionAcknowledged {
                        request_id: request_id.clone(),
                        approved: false,
                        tool: tool.clone(),
                        status: AcknowledgedStatus::TimedOut,
                    };
                    if let Err(e) = sink(ack).await {
                        log::debug!("Session {session_id}: timeout notice not delivered: {e}");
                    }
                    return PermissionDecision::deny(DENY_TIMEOUT);
                }
                // A resolve call already owns the sender; its value is in flight
                rx.await.ok()
            }
        };

        match resolution {
            Some(Resolution::Client(verdict)) if verdict.approved => {
                log::info!("Session {session_id}: permission {request_id} approved");
                PermissionDecision::Allow
            }
            Some(Resolution::Client(verdict)) => {
                log::info!("Session {session_id}: permission {request_id} denied");
                match verdict.reason.filter(|r| !r.is_empty()) {
                    Some(reason) => PermissionDecision::deny(format!("{DENY_USER}: {reason}")),
                    None => PermissionDecision::deny(DENY_USER),
                }
            }
            Some(Resolution::Cancelled) | None => PermissionDecision::deny(DENY_SESSION_ENDED),
        }
    }

    /// Deliver the client's answer to a pending request.
    ///
    /// # Returns
    /// `false` if no such request is pending (already resolved, expired,
    /// cancelled or unknown)
    pub async fn resolve(&self, request_id: &RequestId, verdict: PermissionVerdict) -> bool {
        let Some((tx, pending)) = self.table.lock().take(request_id) else {
            log::warn!("Permission request {request_id} not found");
            return false;
        };

        if let Some(pending) = pending {
            let status = if verdict.approved {
                AcknowledgedStatus::Executing
            } else {
                AcknowledgedStatus::Denied
            };
            let ack = NormalizedEvent::PermissionAcknowledged {
                request_id: request_id.clone(),
                approved: verdict.approved,
                tool: pending.tool.clone(),
                status,
            };
            if let Err(e) = (pending.sink)(ack).await {
                log::warn!("Failed to acknowledge permission {request_id}: {e}");
            }
        }

        if tx.send(Resolution::Client(verdict)).is_err() {
            log::warn!("Permission request {request_id} was already resolved");
        }
        true
    }

    /// Deny every pending request of a session
    ///
    /// # Returns
    /// Number of requests cancelled
    pub fn cancel_session(&self, session_id: &SessionId) -> usize {
        let senders = self.table.lock().take_session(session_id);
        let count = senders.len();
        for tx in senders {
            let _ = tx.send(Resolution::Cancelled);
        }
        if count > 0 {
            log::info!("Session {session_id}: cancelled {count} pending permission request(s)");
        }
        count
    }

    /// Deny every pending request and drop every sink
    pub fn cancel_all(&self) -> usize {
        let senders: Vec<_> = {
            let mut table = self.table.lock();
            table.requests.clear();
            table.futures.drain().map(|(_, tx)| tx).collect()
        };
        self.sinks.lock().clear();

        let count = senders.len();
        for tx in senders {
            let _ = tx.send(Resolution::Cancelled);
        }
        count
    }
}

impl Default for PermissionBroker {
    fn default() -> Self {
        Self::new(DEFAULT_PERMISSION_TIMEOUT)
    }
}
