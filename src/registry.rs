//! Session registry
//!
//! Owns the authoritative map of session ID to session state. The map itself
//! is guarded by a short-lived `parking_lot` lock that is never held across an
//! await; each session additionally has its own async lock that serializes
//! only that session's field mutations.
//!
//! A background reaper ends sessions that stayed idle past the configured
//! timeout. It is the only path that ends a session without an explicit
//! request.

use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};
use crate::types::{Session, SessionId, SessionOptions, SessionStatus};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default maximum number of live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Default idle eviction threshold
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default reaper period
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Registry limits
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of live sessions
    pub max_sessions: usize,
    /// Idle time after which a session is evicted
    pub idle_timeout: Duration,
    /// Reaper period
    pub reap_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

/// Fields to change in [`SessionRegistry::update`]
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    /// New status
    pub status: Option<SessionStatus>,
    /// New error text
    pub error_message: Option<String>,
}

impl SessionUpdate {
    /// Change only the status
    #[must_use]
    pub const fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            error_message: None,
        }
    }

    /// Move to `error` with the given text
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(SessionStatus::Error),
            error_message: Some(message.into()),
        }
    }
}

/// Called with the IDs the reaper evicted
pub type EvictionCallback = Arc<dyn Fn(Vec<SessionId>) + Send + Sync>;

type SessionCell = Arc<Mutex<Session>>;

/// Stored record shape accepted by [`SessionRegistry::restore`]
#[derive(Debug, Deserialize)]
struct RestoredSession {
    session_id: SessionId,
    #[serde(flatten)]
    options: SessionOptions,
    #[serde(default)]
    message_count: u64,
}

/// Authoritative session table
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionCell>>,
    config: RegistryConfig,
    reaper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            reaper: parking_lot::Mutex::new(None),
        }
    }

    /// Registry limits
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new idle session
    ///
    /// # Arguments
    /// * `id` - Requested identifier; a fresh one is minted when `None`
    /// * `options` - Configuration snapshot
    ///
    /// # Errors
    /// Returns `CapacityExceeded` when the registry is full, or
    /// `AlreadyExists` when `id` collides with a live session
    pub fn create(&self, id: Option<SessionId>, options: SessionOptions) -> Result<Session> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.config.max_sessions {
            return Err(GatewayError::capacity_exceeded(self.config.max_sessions));
        }

        let id = id.unwrap_or_else(SessionId::generate);
        if sessions.contains_key(&id) {
            return Err(GatewayError::already_exists(id.as_str()));
        }

        let session = Session::new(id.clone(), options);
        sessions.insert(id.clone(), Arc::new(Mutex::new(session.clone())));
        drop(sessions);

        log::info!("Created session {id}");
        Ok(session)
    }

    fn cell(&self, id: &SessionId) -> Option<SessionCell> {
        self.sessions.read().get(id).cloned()
    }

    /// Snapshot of one session
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let cell = self.cell(id)?;
        let session = cell.lock().await;
        Some(session.clone())
    }

    /// Whether a session is registered
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Apply field changes under the session's lock
    ///
    /// Returns the updated snapshot, or `None` if the session is absent.
    pub async fn update(&self, id: &SessionId, update: SessionUpdate) -> Option<Session> {
        let cell = self.cell(id)?;
        let mut session = cell.lock().await;

        if let Some(status) = update.status {
            session.status = status;
        }
        if let Some(message) = update.error_message {
            session.error_message = Some(message);
        }
        session.updated_at = Utc::now();

        Some(session.clone())
    }

    /// Bump the prompt counter under the session's lock
    pub async fn increment_message_count(&self, id: &SessionId) -> Option<Session> {
        let cell = self.cell(id)?;
        let mut session = cell.lock().await;
        session.message_count += 1;
        session.updated_at = Utc::now();
        Some(session.clone())
    }

    /// End a session and drop it from the registry
    ///
    /// Returns `false` if the session was not registered.
    pub async fn end(&self, id: &SessionId) -> bool {
        let Some(cell) = self.sessions.write().remove(id) else {
            return false;
        };

        let mut session = cell.lock().await;
        session.status = SessionStatus::Ended;
        session.updated_at = Utc::now();
        log::info!("Ended session {id}");
        true
    }

    /// Snapshot of every live session
    pub async fn list(&self) -> Vec<Session> {
        let cells: Vec<SessionCell> = self.sessions.read().values().cloned().collect();

        let mut sessions = Vec::with_capacity(cells.len());
        for cell in cells {
            sessions.push(cell.lock().await.clone());
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    /// IDs of every live session
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// End every idle session whose last update is older than the timeout.
    ///
    /// Sessions whose lock is held are being mutated and therefore skipped.
    ///
    /// # Returns
    /// The evicted session IDs
    pub fn reap_idle(&self) -> Vec<SessionId> {
        let Some(cutoff) = chrono::Duration::from_std(self.config.idle_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
        else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        {
            let mut sessions = self.sessions.write();
            sessions.retain(|id, cell| {
                let Ok(mut session) = cell.try_lock() else {
                    return true;
                };
                if session.status == SessionStatus::Idle && session.updated_at < cutoff {
                    session.status = SessionStatus::Ended;
                    session.updated_at = Utc::now();
                    evicted.push(id.clone());
                    false
                } else {
                    true
                }
            });
        }

        for id in &evicted {
            log::info!("Evicted idle session {id}");
        }
        evicted
    }

    /// Start the background idle reaper.
    ///
    /// `on_evict` receives every non-empty batch of evicted IDs so owners of
    /// per-session resources can release them. Calling this twice replaces the
    /// previous reaper.
    pub fn spawn_reaper(self: &Arc<Self>, on_evict: EvictionCallback) {
        let registry = Arc::downgrade(self);
        let interval = self.config.reap_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };

                let evicted = registry.reap_idle();
                if !evicted.is_empty() {
                    log::info!("Idle reaper evicted {} session(s)", evicted.len());
                    on_evict(evicted);
                }
            }
        });

        if let Some(previous) = self.reaper.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background idle reaper
    pub fn stop_reaper(&self) {
        if let Some(handle) = self.reaper.lock().take() {
            handle.abort();
        }
    }

    /// End every live session
    ///
    /// # Returns
    /// Number of sessions ended
    pub async fn end_all(&self) -> usize {
        let mut ended = 0;
        for id in self.ids() {
            if self.end(&id).await {
                ended += 1;
            }
        }
        ended
    }

    /// Restore stored sessions into `idle` status.
    ///
    /// Best-effort: records that fail to parse, collide with a live session or
    /// exceed capacity are logged and skipped.
    ///
    /// # Returns
    /// Number of sessions restored
    pub fn restore(&self, records: &[serde_json::Value]) -> usize {
        let mut restored = 0;

        for record in records {
            let parsed = match serde_json::from_value::<RestoredSession>(record.clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("Failed to restore session from storage: {e}");
                    continue;
                }
            };

            let mut options = parsed.options;
            options.system_prompt = options.system_prompt.filter(|p| !p.is_empty());
            options.agent_name = options.agent_name.filter(|n| !n.is_empty());
            options.working_directory = options
                .working_directory
                .filter(|d| !d.as_os_str().is_empty());

            match self.create(Some(parsed.session_id.clone()), options) {
                Ok(_) => {
                    if let Some(cell) = self.cell(&parsed.session_id)
                        && let Ok(mut session) = cell.try_lock()
                    {
                        session.message_count = parsed.message_count;
                    }
                    log::info!(
                        "Restored session {} with {} messages",
                        parsed.session_id,
                        parsed.message_count
                    );
                    restored += 1;
                }
                Err(e) => log::warn!("Skipping stored session {}: {e}", parsed.session_id),
            }
        }

        restored
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.get_mut().take() {
            handle.abort();
        }
    }
}
