//! Tests for `PermissionBroker`
//!
//! Approval, denial, timeout, double resolution and session-end cleanup

use agent_gateway::permissions::{EventSink, PermissionBroker, PermissionPolicy, event_sink};
use agent_gateway::types::permissions::{DENY_NO_CHANNEL, DENY_SESSION_ENDED, DENY_TIMEOUT};
use agent_gateway::types::{
    AcknowledgedStatus, HookInput, McpServerConfig, NormalizedEvent, PermissionDecision,
    PermissionMode, PermissionVerdict, RequestId, SessionId,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn channel_sink() -> (EventSink, mpsc::UnboundedReceiver<NormalizedEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = event_sink(move |event| {
        let _ = tx.send(event);
        async { Ok(()) }
    });
    (sink, rx)
}

fn write_call() -> HookInput {
    HookInput::pre_tool_use("Write", json!({"file_path": "/tmp/a.txt"}), Some("tu-1".into()))
}

fn policy() -> Arc<PermissionPolicy> {
    Arc::new(PermissionPolicy::new(PermissionMode::Default, &[]))
}

async fn next_request(rx: &mut mpsc::UnboundedReceiver<NormalizedEvent>) -> RequestId {
    match rx.recv().await {
        Some(NormalizedEvent::PermissionRequest {
            request_id,
            tool,
            description,
            ..
        }) => {
            assert_eq!(tool.as_str(), "Write");
            assert!(description.contains("/tmp/a.txt"));
            request_id
        }
        other => panic!("Expected permission request, got {other:?}"),
    }
}

fn approve() -> PermissionVerdict {
    PermissionVerdict {
        approved: true,
        reason: None,
    }
}

#[tokio::test]
async fn test_approval_flow() {
    let broker = Arc::new(PermissionBroker::new(Duration::from_secs(5)));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let waiter = {
        let broker = broker.clone();
        let session = session.clone();
        tokio::spawn(async move { broker.intercept(&session, &policy(), write_call()).await })
    };

    let request_id = next_request(&mut rx).await;
    assert_eq!(broker.pending_count(), 1);
    assert_eq!(broker.pending_for(&session)[0].tool_use_id.as_deref(), Some("tu-1"));

    assert!(broker.resolve(&request_id, approve()).await);
    match rx.recv().await {
        Some(NormalizedEvent::PermissionAcknowledged {
            approved, status, ..
        }) => {
            assert!(approved);
            assert_eq!(status, AcknowledgedStatus::Executing);
        }
        other => panic!("Expected acknowledgement, got {other:?}"),
    }

    assert_eq!(waiter.await.unwrap(), PermissionDecision::Allow);
    assert_eq!(broker.pending_count(), 0);
}

#[tokio::test]
async fn test_denial_carries_reason() {
    let broker = Arc::new(PermissionBroker::new(Duration::from_secs(5)));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let waiter = {
        let broker = broker.clone();
        let session = session.clone();
        tokio::spawn(async move { broker.intercept(&session, &policy(), write_call()).await })
    };

    let request_id = next_request(&mut rx).await;
    let verdict = PermissionVerdict {
        approved: false,
        reason: Some("not today".into()),
    };
    assert!(broker.resolve(&request_id, verdict).await);

    let decision = waiter.await.unwrap();
    assert!(!decision.is_allow());
    assert_eq!(decision.reason(), Some("User denied permission: not today"));
}

#[tokio::test]
async fn test_second_resolution_is_noop() {
    let broker = Arc::new(PermissionBroker::new(Duration::from_secs(5)));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let waiter = {
        let broker = broker.clone();
        let session = session.clone();
        tokio::spawn(async move { broker.intercept(&session, &policy(), write_call()).await })
    };

    let request_id = next_request(&mut rx).await;
    assert!(broker.resolve(&request_id, approve()).await);
    let deny = PermissionVerdict {
        approved: false,
        reason: None,
    };
    assert!(!broker.resolve(&request_id, deny).await);

    assert_eq!(waiter.await.unwrap(), PermissionDecision::Allow);
}

#[tokio::test]
async fn test_timeout_denies_and_notifies() {
    let broker = PermissionBroker::new(Duration::from_millis(50));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let decision = broker.intercept(&session, &policy(), write_call()).await;
    assert_eq!(decision.reason(), Some(DENY_TIMEOUT));

    let request_id = next_request(&mut rx).await;
    match rx.recv().await {
        Some(NormalizedEvent::PermissionAcknowledged {
            approved, status, ..
        }) => {
            assert!(!approved);
            assert_eq!(status, AcknowledgedStatus::TimedOut);
        }
        other => panic!("Expected timeout notice, got {other:?}"),
    }

    // A late answer finds nothing to resolve
    assert!(!broker.resolve(&request_id, approve()).await);
}

#[tokio::test]
async fn test_no_sink_denies() {
    let broker = PermissionBroker::new(Duration::from_secs(5));
    let decision = broker
        .intercept(&SessionId::new("orphan"), &policy(), write_call())
        .await;
    assert_eq!(decision.reason(), Some(DENY_NO_CHANNEL));
    assert_eq!(broker.pending_count(), 0);
}

#[tokio::test]
async fn test_unguarded_tool_skips_client() {
    let broker = PermissionBroker::new(Duration::from_secs(5));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let read = HookInput::pre_tool_use("Read", json!({"file_path": "a"}), None);
    assert!(broker.intercept(&session, &policy(), read).await.is_allow());

    let bypass = PermissionPolicy::new(PermissionMode::BypassPermissions, &[]);
    assert!(broker.intercept(&session, &bypass, write_call()).await.is_allow());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_mcp_server_opt_out() {
    let broker = PermissionBroker::new(Duration::from_secs(5));
    let session = SessionId::new("s1");
    let (sink, _rx) = channel_sink();
    broker.register_sink(&session, sink);

    let servers = [McpServerConfig::stdio("docs", "docs-server").with_require_permission(false)];
    let policy = PermissionPolicy::new(PermissionMode::Default, &servers);
    let call = HookInput::pre_tool_use("mcp__docs__search", json!({"q": "x"}), None);
    assert!(broker.intercept(&session, &policy, call).await.is_allow());
}

#[tokio::test]
async fn test_cancel_session_denies_pending() {
    let broker = Arc::new(PermissionBroker::new(Duration::from_secs(30)));
    let session = SessionId::new("s1");
    let (sink, mut rx) = channel_sink();
    broker.register_sink(&session, sink);

    let waiter = {
        let broker = broker.clone();
        let session = session.clone();
        tokio::spawn(async move { broker.intercept(&session, &policy(), write_call()).await })
    };
    let request_id = next_request(&mut rx).await;

    assert_eq!(broker.cancel_session(&session), 1);
    let decision = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("cancelled promptly")
        .unwrap();
    assert_eq!(decision.reason(), Some(DENY_SESSION_ENDED));
    assert!(!broker.resolve(&request_id, approve()).await);
}

#[tokio::test]
async fn test_release_keeps_newer_sink() {
    let broker = PermissionBroker::new(Duration::from_secs(5));
    let session = SessionId::new("s1");
    let (old, _old_rx) = channel_sink();
    let (new, _new_rx) = channel_sink();

    broker.register_sink(&session, old.clone());
    broker.register_sink(&session, new.clone());
    broker.release_sink(&session, &old);
    assert!(broker.has_sink(&session));

    broker.release_sink(&session, &new);
    assert!(!broker.has_sink(&session));
}
