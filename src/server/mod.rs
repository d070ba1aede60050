//! HTTP surface
//!
//! Health and agent-definition endpoints next to the `/ws` endpoint served
//! by the [`connection`] dispatcher.

pub mod auth;
pub mod connection;

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::lifecycle::Gateway;

pub use connection::ConnectionState;

/// Service name reported by `GET /`
pub const SERVICE_NAME: &str = "Claude Agent Server";

/// Build the router
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/agents", get(list_agents))
        .route("/agents/{name}", get(get_agent))
        .route("/ws", get(websocket))
        .with_state(gateway)
}

async fn root(State(gateway): State<Arc<Gateway>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": crate::VERSION,
        "sessions": gateway.registry().len(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Default, Deserialize)]
struct AgentsQuery {
    working_directory: Option<PathBuf>,
}

async fn list_agents(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<AgentsQuery>,
) -> Json<serde_json::Value> {
    let loader = gateway.agents().loader(query.working_directory.as_deref());
    let agents: Vec<_> = loader
        .list()
        .values()
        .map(|agent| agent.summary(false))
        .collect();
    log::info!(
        "Listed {} available agents from {}",
        agents.len(),
        loader.agents_dir().display()
    );
    Json(json!({
        "status": "ok",
        "count": agents.len(),
        "agents": agents,
        "agents_dir": loader.agents_dir().display().to_string(),
    }))
}

async fn get_agent(
    State(gateway): State<Arc<Gateway>>,
    Path(name): Path<String>,
    Query(query): Query<AgentsQuery>,
) -> Response {
    let loader = gateway.agents().loader(query.working_directory.as_deref());
    let agents_dir = loader.agents_dir().display().to_string();
    match loader.get(&name) {
        Some(agent) => Json(json!({
            "status": "ok",
            "agent": agent.summary(true),
            "agents_dir": agents_dir,
        }))
        .into_response(),
        None => {
            log::warn!("Agent '{name}' not found in {agents_dir}");
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "status": "error",
                    "message": format!("Agent '{name}' not found in {agents_dir}"),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn websocket(
    ws: WebSocketUpgrade,
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<WsQuery>,
) -> Response {
    let tracker = gateway.connections().clone();
    ws.on_upgrade(move |socket| {
        tracker.track_future(connection::serve(socket, gateway, query.token))
    })
}
