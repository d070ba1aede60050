//! Tests for the WebSocket frame codec

use agent_gateway::protocol::{FrameError, InboundFrame, OutboundFrame, parse_inbound};
use agent_gateway::types::{
    AcknowledgedStatus, MessageId, NormalizedEvent, PermissionMode, RequestId, SessionId, ToolName,
};
use serde_json::{Value, json};

fn to_value(frame: &OutboundFrame) -> Value {
    serde_json::from_str(&frame.to_text().unwrap()).unwrap()
}

#[test]
fn test_parse_create_session_with_options() {
    let frame = parse_inbound(
        r#"{"type":"create_session","options":{"tools":["Read"],"permission_mode":"acceptEdits","working_directory":"/w"}}"#,
    )
    .unwrap();

    match frame {
        InboundFrame::CreateSession {
            session_id,
            options,
        } => {
            assert!(session_id.is_none());
            assert_eq!(options.tools, vec![ToolName::new("Read")]);
            assert_eq!(options.permission_mode, PermissionMode::AcceptEdits);
            assert_eq!(options.working_directory.unwrap().to_str(), Some("/w"));
        }
        other => panic!("Expected create_session, got {other:?}"),
    }
}

#[test]
fn test_parse_defaults() {
    match parse_inbound(r#"{"type":"create_session"}"#).unwrap() {
        InboundFrame::CreateSession { options, .. } => {
            assert_eq!(options.tools.len(), 5);
            assert_eq!(options.permission_mode, PermissionMode::Default);
        }
        other => panic!("Expected create_session, got {other:?}"),
    }

    let frame = parse_inbound(r#"{"type":"list_sessions"}"#).unwrap();
    assert_eq!(frame, InboundFrame::ListSessions {});
    assert_eq!(frame.kind(), "list_sessions");
}

#[test]
fn test_parse_permission_response() {
    let frame = parse_inbound(
        r#"{"type":"permission_response","session_id":"s1","request_id":"r1","approved":false,"reason":"no"}"#,
    )
    .unwrap();
    assert_eq!(
        frame,
        InboundFrame::PermissionResponse {
            session_id: Some(SessionId::new("s1")),
            request_id: RequestId::new("r1"),
            approved: false,
            reason: Some("no".into()),
        }
    );
}

#[test]
fn test_parse_rejections() {
    let err = parse_inbound("{not json").unwrap_err();
    assert!(matches!(err, FrameError::InvalidJson(_)));
    assert!(err.to_string().starts_with("Invalid JSON: "));

    let err = parse_inbound(r#"{"type":"dance"}"#).unwrap_err();
    assert_eq!(err.to_string(), "Unknown message type: dance");

    let err = parse_inbound(r#"{"prompt":"hi"}"#).unwrap_err();
    assert_eq!(err.to_string(), "Unknown message type: None");

    let err = parse_inbound(r#"{"type":"send_prompt","session_id":"s1"}"#).unwrap_err();
    assert!(matches!(err, FrameError::Invalid { ref frame_type, .. } if frame_type == "send_prompt"));
}

#[test]
fn test_event_frames() {
    let session = SessionId::new("s1");

    let thinking = OutboundFrame::from_event(&session, NormalizedEvent::Thinking(true));
    assert_eq!(
        to_value(&thinking),
        json!({"type": "agent_thinking", "session_id": "s1", "thinking": true})
    );

    let message = OutboundFrame::from_event(
        &session,
        NormalizedEvent::message("Hi", true, &MessageId::new("m1")),
    );
    assert_eq!(
        to_value(&message),
        json!({"type": "agent_message", "session_id": "s1", "content": "Hi", "complete": true, "message_id": "m1"})
    );

    let tool = OutboundFrame::from_event(
        &session,
        NormalizedEvent::ToolUse {
            tool: ToolName::new("Read"),
            parameters: json!({"file_path": "a"}),
            tool_use_id: "tu-1".into(),
            input: None,
        },
    );
    let value = to_value(&tool);
    assert_eq!(value["type"], "agent_tool_use");
    assert!(value.get("input").is_none());

    let ack = OutboundFrame::from_event(
        &session,
        NormalizedEvent::PermissionAcknowledged {
            request_id: RequestId::new("r1"),
            approved: false,
            tool: ToolName::new("Write"),
            status: AcknowledgedStatus::TimedOut,
        },
    );
    assert_eq!(to_value(&ack)["status"], "timed_out");

    let error = OutboundFrame::from_event(&session, NormalizedEvent::Error("boom".into()));
    assert_eq!(
        to_value(&error),
        json!({"type": "agent_error", "session_id": "s1", "message": "boom"})
    );
}

#[test]
fn test_error_frames() {
    assert_eq!(
        to_value(&OutboundFrame::error("bad")),
        json!({"type": "error", "message": "bad"})
    );
    assert_eq!(
        to_value(&OutboundFrame::session_error(&SessionId::new("s1"), "Session s1 not found")),
        json!({"type": "error", "message": "Session s1 not found", "session_id": "s1"})
    );
}

#[test]
fn test_pong_echoes_timestamp() {
    let pong = OutboundFrame::pong(Some(json!(1_700_000_000)));
    assert_eq!(to_value(&pong), json!({"type": "pong", "timestamp": 1_700_000_000}));

    let generated = to_value(&OutboundFrame::pong(None));
    assert!(generated["timestamp"].is_string());
}

#[test]
fn test_agents_killed_shape() {
    let frame = OutboundFrame::AgentsKilled {
        killed_count: 2,
        sessions_ended: vec![SessionId::new("a"), SessionId::new("b")],
    };
    assert_eq!(
        to_value(&frame),
        json!({"type": "agents_killed", "killed_count": 2, "sessions_ended": ["a", "b"]})
    );
}
