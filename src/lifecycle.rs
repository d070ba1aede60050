//! Process lifecycle
//!
//! [`Gateway`] owns every long-lived component. It is built once at startup,
//! shared with the HTTP layer as `Arc<Gateway>`, and torn down by
//! [`Gateway::shutdown`].

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adapter::AgentAdapter;
use crate::agents::AgentCatalog;
use crate::backend::AgentBackend;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::permissions::PermissionBroker;
use crate::registry::{EvictionCallback, RegistryConfig, SessionRegistry};
use crate::storage::SessionStore;
use crate::types::SessionId;

/// Shared state of a running gateway
pub struct Gateway {
    config: GatewayConfig,
    api_key: Option<String>,
    registry: Arc<SessionRegistry>,
    broker: Arc<PermissionBroker>,
    adapter: Arc<AgentAdapter>,
    store: Arc<dyn SessionStore>,
    agents: AgentCatalog,
    connections: TaskTracker,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Build the components, restore stored sessions and start the reaper.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is out of range
    pub async fn start(
        config: GatewayConfig,
        backend: Arc<dyn AgentBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Arc<Self>> {
        Self::start_with_agents(config, backend, store, AgentCatalog::new()).await
    }

    /// [`Gateway::start`] with an explicit agent catalog
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is out of range
    pub async fn start_with_agents(
        config: GatewayConfig,
        backend: Arc<dyn AgentBackend>,
        store: Arc<dyn SessionStore>,
        agents: AgentCatalog,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let api_key = if config.auth_enabled {
            let key = config.resolve_api_key();
            if key.is_none() {
                log::warn!("Authentication is enabled but no API key is configured");
            }
            key
        } else {
            log::warn!("Authentication is disabled");
            None
        };

        let registry = Arc::new(SessionRegistry::new(RegistryConfig {
            max_sessions: config.max_concurrent_sessions,
            idle_timeout: config.session_timeout(),
            reap_interval: config.reaper_interval(),
        }));
        let broker = Arc::new(PermissionBroker::new(config.permission_timeout()));
        let adapter = Arc::new(AgentAdapter::new(backend, broker.clone()));

        let records = store.load_sessions().await;
        if !records.is_empty() {
            let restored = registry.restore(&records);
            log::info!("Restored {restored} of {} stored session(s)", records.len());
        }

        let gateway = Arc::new(Self {
            config,
            api_key,
            registry,
            broker,
            adapter,
            store,
            agents,
            connections: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        });

        gateway.registry.spawn_reaper(gateway.eviction_callback());
        log::info!(
            "Gateway started (max {} sessions, idle timeout {}s)",
            gateway.config.max_concurrent_sessions,
            gateway.config.session_timeout_secs
        );
        Ok(gateway)
    }

    fn eviction_callback(&self) -> EvictionCallback {
        let adapter = self.adapter.clone();
        let broker = self.broker.clone();
        Arc::new(move |evicted: Vec<SessionId>| {
            let adapter = adapter.clone();
            let broker = broker.clone();
            tokio::spawn(async move {
                for session_id in evicted {
                    broker.cancel_session(&session_id);
                    adapter.end(&session_id).await;
                }
            });
        })
    }

    /// Runtime configuration
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared secret clients must present, when authentication is enabled
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Session registry
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Permission broker
    #[must_use]
    pub const fn broker(&self) -> &Arc<PermissionBroker> {
        &self.broker
    }

    /// Agent execution adapter
    #[must_use]
    pub const fn adapter(&self) -> &Arc<AgentAdapter> {
        &self.adapter
    }

    /// Persistence collaborator
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Agent definition catalog
    #[must_use]
    pub const fn agents(&self) -> &AgentCatalog {
        &self.agents
    }

    /// Tracker of live WebSocket connections
    #[must_use]
    pub const fn connections(&self) -> &TaskTracker {
        &self.connections
    }

    /// Token cancelled when the gateway shuts down
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// End one session: its agent, its pending permissions, then its record.
    ///
    /// # Returns
    /// `true` if the registry knew the session
    pub async fn end_session(&self, session_id: &SessionId) -> bool {
        self.adapter.end(session_id).await;
        self.broker.cancel_session(session_id);
        let ended = self.registry.end(session_id).await;

        // A prompt task may have lazily started an agent in between
        if self.adapter.end(session_id).await {
            log::debug!("Session {session_id}: closed agent started during end");
        }
        ended
    }

    /// Close every live agent, leaving registry records in place.
    ///
    /// # Returns
    /// Number of agents closed cleanly and the sessions that had one
    pub async fn kill_all_agents(&self) -> (usize, Vec<SessionId>) {
        let active = self.adapter.active_sessions();
        let killed = self.adapter.end_all().await;
        for session_id in &active {
            self.broker.cancel_session(session_id);
        }
        log::info!("Killed {killed} agent(s) of {} active session(s)", active.len());
        (killed, active)
    }

    /// Stop background work and release every session.
    ///
    /// Pending permissions are denied and agents closed before waiting for
    /// the connections, so no in-flight prompt is left blocked.
    pub async fn shutdown(&self) {
        log::info!("Shutting down gateway...");
        self.shutdown.cancel();
        self.registry.stop_reaper();

        let cancelled = self.broker.cancel_all();
        let agents = self.adapter.end_all().await;

        self.connections.close();
        self.connections.wait().await;

        let sessions = self.registry.end_all().await;
        log::info!(
            "Gateway shutdown complete ({sessions} session(s), {agents} agent(s), {cancelled} pending permission(s))"
        );
    }
}
