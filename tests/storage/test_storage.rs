//! Tests for the session stores
//!
//! The HTTP client runs against a mock storage service

use agent_gateway::storage::{
    HttpSessionStore, MemorySessionStore, MessageRecord, SessionRecord, SessionStore,
    USER_PROMPT_MESSAGE_ID,
};
use agent_gateway::types::SessionId;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "/api/agent-sessions";

fn record(id: &str) -> SessionRecord {
    SessionRecord {
        session_id: SessionId::new(id),
        session_name: format!("Session {id}"),
        avatar_name: String::new(),
        working_directory: "/work".to_string(),
        agent_name: String::new(),
        system_prompt: String::new(),
        permission_mode: "default".to_string(),
        tools: vec!["Read".to_string()],
    }
}

fn store(server: &MockServer, api_key: Option<&str>) -> HttpSessionStore {
    HttpSessionStore::new(
        format!("{}{COLLECTION}/", server.uri()),
        api_key.map(String::from),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn test_save_session_posts_record_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COLLECTION))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"session_id": "s1", "tools": ["Read"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server, Some("secret"));
    assert!(store.base_url().ends_with(COLLECTION));
    assert!(store.save_session(record("s1")).await);
}

#[tokio::test]
async fn test_non_ok_status_is_reported_as_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let store = store(&server, None);
    assert!(!store.save_session(record("s1")).await);
    assert!(
        !store
            .save_message(SessionId::new("s1"), MessageRecord::text("m", "user", "hi"))
            .await
    );
}

#[tokio::test]
async fn test_save_message_targets_session_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{COLLECTION}/s1/messages")))
        .and(body_partial_json(json!({
            "message_id": "tu-7",
            "role": "assistant",
            "content": "Using tool: Bash",
            "tool_name": "Bash"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server, None);
    assert!(
        store
            .save_message(SessionId::new("s1"), MessageRecord::tool_use("tu-7", "Bash"))
            .await
    );
}

#[tokio::test]
async fn test_load_sessions_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(COLLECTION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [{"session_id": "a"}, {"session_id": "b", "message_count": 3}]
        })))
        .mount(&server)
        .await;

    let sessions = store(&server, None).load_sessions().await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1]["message_count"], 3);
}

#[tokio::test]
async fn test_load_messages_and_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COLLECTION}/s1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"message_id": "user-prompt", "role": "user", "content": "hi"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{COLLECTION}/s2")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store(&server, None);
    let messages = store.load_session_messages(SessionId::new("s1")).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hi");

    assert!(store.load_session_messages(SessionId::new("s2")).await.is_empty());
}

#[tokio::test]
async fn test_unreachable_service_degrades() {
    let store = HttpSessionStore::new(
        "http://127.0.0.1:9/api/agent-sessions",
        None,
        Duration::from_millis(200),
    )
    .unwrap();
    assert!(store.load_sessions().await.is_empty());
    assert!(!store.save_session(record("s1")).await);
}

#[tokio::test]
async fn test_memory_store_replaces_and_counts() {
    let store = MemorySessionStore::new();
    assert!(store.save_session(record("s1")).await);
    let mut renamed = record("s1");
    renamed.session_name = "Renamed".to_string();
    assert!(store.save_session(renamed).await);

    let id = SessionId::new("s1");
    store
        .save_message(id.clone(), MessageRecord::text(USER_PROMPT_MESSAGE_ID, "user", "hi"))
        .await;
    store
        .save_message(id.clone(), MessageRecord::text("msg-2", "assistant", "Echo: hi"))
        .await;

    assert_eq!(store.sessions().len(), 1);
    assert_eq!(store.sessions()[0].session_name, "Renamed");

    let loaded = store.load_sessions().await;
    assert_eq!(loaded[0]["session_id"], "s1");
    assert_eq!(loaded[0]["message_count"], 2);

    let messages = store.load_session_messages(id.clone()).await;
    assert_eq!(messages[0]["message_id"], USER_PROMPT_MESSAGE_ID);
    assert_eq!(store.messages(&id)[1].content, "Echo: hi");
}
