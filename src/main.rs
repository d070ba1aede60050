// Agent gateway server
//
// Serves the session WebSocket protocol and the agent-definition endpoints.
// Configured through AGENT_SERVER_* environment variables.

use agent_gateway::{
    AgentBackend, ClaudeCliBackend, Gateway, GatewayConfig, HttpSessionStore, MemorySessionStore,
    SessionStore,
};
use anyhow::Result;
use std::sync::Arc;

fn session_store(config: &GatewayConfig) -> Arc<dyn SessionStore> {
    if !config.storage_enabled {
        log::info!("Storage disabled; sessions are kept in memory only");
        return Arc::new(MemorySessionStore::new());
    }
    match HttpSessionStore::from_config(config, config.resolve_api_key()) {
        Ok(store) => {
            log::info!("Persisting sessions to {}", store.base_url());
            Arc::new(store)
        }
        Err(e) => {
            log::error!("Failed to initialize storage client: {e}");
            log::error!("Session persistence is disabled; messages will not be saved");
            Arc::new(MemorySessionStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let backend: Arc<dyn AgentBackend> = Arc::new(ClaudeCliBackend::new(config.cli_path.clone()));
    let store = session_store(&config);
    let gateway = Gateway::start(config, backend, store).await?;

    let addr = gateway.config().bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {addr}: {e}"))?;

    let mut server = tokio::spawn(agent_gateway::serve(listener, gateway.clone()));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("Failed to listen for ctrl-c: {e}");
            }
            log::info!("Shutdown requested");
            gateway.shutdown().await;
            server.await??;
        }
        result = &mut server => {
            gateway.shutdown().await;
            result??;
        }
    }

    Ok(())
}
