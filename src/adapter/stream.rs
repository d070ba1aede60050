//! Turning raw agent messages into normalized events

use std::collections::HashSet;

use crate::types::{ContentBlock, Message, MessageId, NormalizedEvent, SessionId, ToolName};

/// Tools whose input is state the client renders, not free text
pub const STATEFUL_INPUT_TOOLS: &[&str] = &["TodoWrite"];

/// Per-turn state machine from raw messages to normalized events.
///
/// Text is accumulated into one logical message and repeated chunks are
/// dropped. Text arriving after a tool call closes the current message and
/// starts a new one.
#[derive(Debug)]
pub struct Segmenter {
    session_id: SessionId,
    message_id: MessageId,
    buffer: Vec<String>,
    seen: HashSet<String>,
    thinking_sent: bool,
    last_had_tool_use: bool,
    received: usize,
}

impl Segmenter {
    /// Fresh state for one turn
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            message_id: MessageId::generate(),
            buffer: Vec::new(),
            seen: HashSet::new(),
            thinking_sent: false,
            last_had_tool_use: false,
            received: 0,
        }
    }

    /// Events produced by one raw message
    pub fn push(&mut self, message: Message) -> Vec<NormalizedEvent> {
        self.received += 1;
        let Message::Assistant { message, .. } = message else {
            log::debug!(
                "Session {}: skipping non-assistant message #{}",
                self.session_id,
                self.received
            );
            return Vec::new();
        };

        let mut events = Vec::new();
        if !self.thinking_sent {
            self.thinking_sent = true;
            events.push(NormalizedEvent::Thinking(false));
        }

        let has_tool_use = message
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let has_text = message
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::Text { .. }));

        if self.last_had_tool_use && has_text {
            if !self.buffer.is_empty() {
                events.push(NormalizedEvent::message(
                    self.buffer.concat(),
                    true,
                    &self.message_id,
                ));
                self.buffer.clear();
                self.seen.clear();
            }
            self.message_id = MessageId::generate();
            log::debug!(
                "Session {}: new message {} after tool execution",
                self.session_id,
                self.message_id
            );
        }
        self.last_had_tool_use = has_tool_use;

        let mut text = String::new();
        for block in message.content {
            match block {
                ContentBlock::Text { text: chunk } => text.push_str(&chunk),
                ContentBlock::ToolUse { id, name, input } => {
                    let extra = (STATEFUL_INPUT_TOOLS.contains(&name.as_str())
                        && !is_empty_input(&input))
                    .then(|| input.clone());
                    events.push(NormalizedEvent::ToolUse {
                        tool: ToolName::new(name),
                        parameters: input,
                        tool_use_id: id,
                        input: extra,
                    });
                }
                ContentBlock::Thinking { .. } | ContentBlock::ToolResult { .. } => {}
            }
        }

        if has_text {
            if self.seen.insert(text.clone()) {
                self.buffer.push(text.clone());
                events.push(NormalizedEvent::message(text, false, &self.message_id));
            } else {
                log::debug!("Session {}: skipping duplicate content", self.session_id);
            }
        }

        events
    }

    /// Events closing the turn
    #[must_use]
    pub fn finish(self) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        if !self.thinking_sent {
            events.push(NormalizedEvent::Thinking(false));
        }
        if self.buffer.is_empty() {
            log::warn!(
                "Session {}: no content to send in completion ({} messages received)",
                self.session_id,
                self.received
            );
        } else {
            let content = self.buffer.concat();
            log::info!(
                "Session {}: completing message with {} chars",
                self.session_id,
                content.len()
            );
            events.push(NormalizedEvent::message(content, true, &self.message_id));
        }
        events
    }
}

fn is_empty_input(input: &serde_json::Value) -> bool {
    match input {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
