//! Tests for `SessionRegistry`
//!
//! Capacity, status updates, idle eviction and restore from storage records

use agent_gateway::error::GatewayError;
use agent_gateway::registry::{RegistryConfig, SessionRegistry, SessionUpdate};
use agent_gateway::types::{PermissionMode, SessionId, SessionOptions, SessionStatus};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn registry(max_sessions: usize, idle_timeout: Duration) -> SessionRegistry {
    SessionRegistry::new(RegistryConfig {
        max_sessions,
        idle_timeout,
        reap_interval: Duration::from_millis(20),
    })
}

#[tokio::test]
async fn test_capacity_limit_and_recovery() {
    let registry = registry(2, Duration::from_secs(3600));
    let first = registry.create(None, SessionOptions::default()).unwrap();
    registry.create(None, SessionOptions::default()).unwrap();

    let err = registry.create(None, SessionOptions::default()).unwrap_err();
    assert!(matches!(err, GatewayError::CapacityExceeded(2)));
    assert_eq!(err.to_string(), "Maximum concurrent sessions (2) reached");

    assert!(registry.end(&first.id).await);
    assert_ok!(registry.create(None, SessionOptions::default()));
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let registry = registry(5, Duration::from_secs(3600));
    let id = SessionId::new("fixed");
    registry.create(Some(id.clone()), SessionOptions::default()).unwrap();

    let err = assert_err!(registry.create(Some(id), SessionOptions::default()));
    assert!(matches!(err, GatewayError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_new_session_snapshot() {
    let registry = registry(5, Duration::from_secs(3600));
    let session = registry.create(None, SessionOptions::default()).unwrap();

    assert_eq!(session.status, SessionStatus::Idle);
    assert_eq!(session.message_count, 0);
    assert!(session.error_message.is_none());
    assert_eq!(registry.get(&session.id).await, Some(session));
}

#[tokio::test]
async fn test_failed_update_records_message() {
    let registry = registry(5, Duration::from_secs(3600));
    let session = registry.create(None, SessionOptions::default()).unwrap();

    registry.increment_message_count(&session.id).await;
    let updated = registry
        .update(&session.id, SessionUpdate::failed("boom"))
        .await
        .unwrap();

    assert_eq!(updated.status, SessionStatus::Error);
    assert_eq!(updated.error_message.as_deref(), Some("boom"));
    assert_eq!(updated.message_count, 1);
}

#[tokio::test]
async fn test_end_unknown_session() {
    let registry = registry(5, Duration::from_secs(3600));
    assert!(!registry.end(&SessionId::new("missing")).await);
    assert!(registry.get(&SessionId::new("missing")).await.is_none());
}

#[tokio::test]
async fn test_reap_only_idle_sessions() {
    let registry = registry(5, Duration::from_millis(30));
    let idle = registry.create(None, SessionOptions::default()).unwrap();
    let busy = registry.create(None, SessionOptions::default()).unwrap();
    registry
        .update(&busy.id, SessionUpdate::status(SessionStatus::Processing))
        .await;

    tokio::time::sleep(Duration::from_millis(80)).await;

    let evicted = registry.reap_idle();
    assert_eq!(evicted, vec![idle.id.clone()]);
    assert!(!registry.contains(&idle.id));
    assert!(registry.contains(&busy.id));
}

#[tokio::test]
async fn test_background_reaper_reports_evictions() {
    let registry = Arc::new(registry(5, Duration::from_millis(20)));
    let session = registry.create(None, SessionOptions::default()).unwrap();

    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    registry.spawn_reaper(Arc::new(move |ids: Vec<SessionId>| {
        sink.lock().extend(ids);
    }));

    tokio::time::sleep(Duration::from_millis(150)).await;
    registry.stop_reaper();

    assert_eq!(evicted.lock().clone(), vec![session.id.clone()]);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_restore_from_records() {
    let registry = registry(2, Duration::from_secs(3600));
    let records = vec![
        json!({
            "session_id": "restored-1",
            "working_directory": "",
            "system_prompt": "",
            "agent_name": "reviewer",
            "permission_mode": "acceptEdits",
            "tools": "[\"Read\",\"Grep\"]",
            "message_count": 4
        }),
        json!({"no_session_id": true}),
        json!({"session_id": "restored-2", "tools": ["Write"]}),
        json!({"session_id": "over-capacity"}),
    ];

    assert_eq!(registry.restore(&records), 2);

    let first = registry.get(&SessionId::new("restored-1")).await.unwrap();
    assert_eq!(first.status, SessionStatus::Idle);
    assert_eq!(first.message_count, 4);
    assert_eq!(first.options.permission_mode, PermissionMode::AcceptEdits);
    assert_eq!(first.options.agent_name.as_deref(), Some("reviewer"));
    assert!(first.options.system_prompt.is_none());
    assert!(first.options.working_directory.is_none());
    assert_eq!(first.options.tools.len(), 2);

    assert!(!registry.contains(&SessionId::new("over-capacity")));
}

#[tokio::test]
async fn test_end_all() {
    let registry = registry(5, Duration::from_secs(3600));
    for _ in 0..3 {
        registry.create(None, SessionOptions::default()).unwrap();
    }
    assert_eq!(registry.end_all().await, 3);
    assert!(registry.list().await.is_empty());
}
