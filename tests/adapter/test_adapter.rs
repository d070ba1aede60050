//! Tests for `AgentAdapter` over the scripted backend
//!
//! Agent start-up, event normalization and the permission hook

use agent_gateway::adapter::AgentAdapter;
use agent_gateway::backend::{ScriptedBackend, ScriptedTurn};
use agent_gateway::error::GatewayError;
use agent_gateway::permissions::{EventSink, PermissionBroker, event_sink};
use agent_gateway::types::{
    NormalizedEvent, PermissionMode, PermissionVerdict, SessionId, SessionOptions,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn setup() -> (ScriptedBackend, Arc<PermissionBroker>, AgentAdapter) {
    let backend = ScriptedBackend::new();
    let broker = Arc::new(PermissionBroker::new(Duration::from_secs(5)));
    let adapter = AgentAdapter::new(Arc::new(backend.clone()), broker.clone());
    (backend, broker, adapter)
}

fn null_sink() -> EventSink {
    event_sink(|_event| async { Ok(()) })
}

async fn collect(adapter: &AgentAdapter, session: &SessionId, prompt: &str) -> Vec<NormalizedEvent> {
    adapter
        .submit(session, prompt.to_string(), null_sink())
        .unwrap()
        .collect()
        .await
}

fn messages(events: &[NormalizedEvent]) -> Vec<(String, bool, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            NormalizedEvent::Message {
                content,
                complete,
                message_id,
            } => Some((content.clone(), *complete, message_id.to_string())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_start_passes_session_options() {
    let (backend, _broker, adapter) = setup();
    let session = SessionId::new("s1");
    let options = SessionOptions::default()
        .with_tools(["Read", "Write"])
        .with_system_prompt("Be brief.")
        .with_permission_mode(PermissionMode::AcceptEdits);

    adapter.start(&session, &options).await.unwrap();

    let spawned = backend.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].system_prompt, "Be brief.");
    assert_eq!(spawned[0].allowed_tools.len(), 2);
    assert_eq!(spawned[0].permission_mode, PermissionMode::AcceptEdits);
    assert!(adapter.has_session(&session));
    assert_eq!(adapter.active_sessions(), vec![session.clone()]);

    let again = adapter.start(&session, &options).await.unwrap_err();
    assert!(matches!(again, GatewayError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_spawn_failure_is_agent_creation_error() {
    let (backend, _broker, adapter) = setup();
    backend.fail_spawn("no binary");

    let err = adapter
        .start(&SessionId::new("s1"), &SessionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AgentCreationFailed(_)));
    assert!(!adapter.has_session(&SessionId::new("s1")));
}

#[tokio::test]
async fn test_echo_turn_events() {
    let (backend, _broker, adapter) = setup();
    let session = SessionId::new("s1");
    adapter.start(&session, &SessionOptions::default()).await.unwrap();

    let events = collect(&adapter, &session, "hi").await;

    assert_eq!(events[0], NormalizedEvent::Thinking(true));
    assert_eq!(events[1], NormalizedEvent::Thinking(false));
    let texts = messages(&events);
    assert_eq!(texts.len(), 2);
    assert_eq!((texts[0].0.as_str(), texts[0].1), ("Echo: hi", false));
    assert_eq!((texts[1].0.as_str(), texts[1].1), ("Echo: hi", true));
    assert_eq!(texts[0].2, texts[1].2);

    assert_eq!(backend.prompts(), vec![(session, "hi".to_string())]);
}

#[tokio::test]
async fn test_text_after_tool_starts_new_message() {
    let (backend, _broker, adapter) = setup();
    let session = SessionId::new("s1");
    adapter.start(&session, &SessionOptions::default()).await.unwrap();

    backend.push_turn(
        ScriptedTurn::new()
            .text("Let me look.")
            .text("Let me look.")
            .tool_use("tu-1", "Read", json!({"file_path": "a.rs"}))
            .text("Found it."),
    );
    let events = collect(&adapter, &session, "read a.rs").await;

    let tool_at = events
        .iter()
        .position(|e| matches!(e, NormalizedEvent::ToolUse { .. }))
        .expect("tool event");
    match &events[tool_at] {
        NormalizedEvent::ToolUse {
            tool,
            tool_use_id,
            input,
            ..
        } => {
            assert_eq!(tool.as_str(), "Read");
            assert_eq!(tool_use_id, "tu-1");
            assert!(input.is_none());
        }
        _ => unreachable!(),
    }

    let texts = messages(&events);
    assert_eq!(
        texts
            .iter()
            .map(|(c, complete, _)| (c.as_str(), *complete))
            .collect::<Vec<_>>(),
        vec![
            ("Let me look.", false),
            ("Let me look.", true),
            ("Found it.", false),
            ("Found it.", true),
        ]
    );
    assert_eq!(texts[0].2, texts[1].2);
    assert_ne!(texts[1].2, texts[2].2);
    assert_eq!(texts[2].2, texts[3].2);
}

#[tokio::test]
async fn test_todo_write_carries_input() {
    let (backend, _broker, adapter) = setup();
    let session = SessionId::new("s1");
    let options = SessionOptions::default().with_permission_mode(PermissionMode::BypassPermissions);
    adapter.start(&session, &options).await.unwrap();

    let todos = json!({"todos": [{"content": "write tests", "status": "pending"}]});
    backend.push_turn(ScriptedTurn::new().tool_use("tu-9", "TodoWrite", todos.clone()));
    let events = collect(&adapter, &session, "plan").await;

    let input = events.iter().find_map(|e| match e {
        NormalizedEvent::ToolUse { input, .. } => input.clone(),
        _ => None,
    });
    assert_eq!(input, Some(todos));
}

#[tokio::test]
async fn test_stream_failure_yields_single_error() {
    let (backend, _broker, adapter) = setup();
    let session = SessionId::new("s1");
    adapter.start(&session, &SessionOptions::default()).await.unwrap();

    backend.push_turn(ScriptedTurn::new().text("partial").fail("pipe closed"));
    let events = collect(&adapter, &session, "go").await;

    let errors: Vec<_> = events.iter().filter(|e| e.is_error()).collect();
    assert_eq!(errors.len(), 1);
    match events.last() {
        Some(NormalizedEvent::Error(message)) => {
            assert!(message.starts_with("Error processing response:"));
            assert!(message.contains("pipe closed"));
        }
        other => panic!("Expected error last, got {other:?}"),
    }
    assert!(messages(&events).iter().all(|(_, complete, _)| !complete));
}

#[tokio::test]
async fn test_guarded_tool_waits_for_approval() {
    let (backend, broker, adapter) = setup();
    let session = SessionId::new("s1");
    let options = SessionOptions::default().with_tools(["Write"]);
    adapter.start(&session, &options).await.unwrap();

    backend.push_turn(
        ScriptedTurn::new()
            .tool_use("tu-1", "Write", json!({"file_path": "hello.txt", "content": "hi"}))
            .text("Done."),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = event_sink(move |event| {
        let _ = tx.send(event);
        async { Ok(()) }
    });

    let approver = {
        let broker = broker.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let NormalizedEvent::PermissionRequest { request_id, .. } = event {
                    let verdict = PermissionVerdict {
                        approved: true,
                        reason: None,
                    };
                    assert!(broker.resolve(&request_id, verdict).await);
                    return true;
                }
            }
            false
        })
    };

    let events: Vec<_> = adapter
        .submit(&session, "create hello.txt".into(), sink)
        .unwrap()
        .collect()
        .await;

    assert!(approver.await.unwrap());
    assert!(messages(&events).iter().any(|(c, _, _)| c == "Done."));

    let outcomes = backend.tool_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].allowed);
    assert!(!broker.has_sink(&session));
}

#[tokio::test]
async fn test_non_interactive_mode_skips_broker() {
    let (backend, broker, adapter) = setup();
    let session = SessionId::new("s1");
    let options = SessionOptions::default().with_permission_mode(PermissionMode::BypassPermissions);
    adapter.start(&session, &options).await.unwrap();

    backend.push_turn(ScriptedTurn::new().tool_use("tu-1", "Bash", json!({"command": "ls"})));
    collect(&adapter, &session, "ls").await;

    assert!(backend.tool_outcomes()[0].allowed);
    assert_eq!(broker.pending_count(), 0);
}

#[tokio::test]
async fn test_submit_unknown_session() {
    let (_backend, _broker, adapter) = setup();
    let err = adapter
        .submit(&SessionId::new("ghost"), "hi".into(), null_sink())
        .err()
        .expect("unknown session");
    assert!(matches!(err, GatewayError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_end_and_end_all() {
    let (backend, _broker, adapter) = setup();
    for id in ["a", "b", "c"] {
        adapter
            .start(&SessionId::new(id), &SessionOptions::default())
            .await
            .unwrap();
    }

    assert!(adapter.end(&SessionId::new("a")).await);
    assert!(!adapter.end(&SessionId::new("a")).await);
    assert_eq!(adapter.end_all().await, 2);
    assert!(adapter.active_sessions().is_empty());
    assert_eq!(backend.closed().len(), 3);
    assert_eq!(backend.interrupted().len(), 3);
    assert_eq!(backend.interrupted()[0], SessionId::new("a"));
}
