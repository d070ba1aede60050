//! In-memory storage, used when the storage service is disabled

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::types::SessionId;

use super::{MessageRecord, SessionRecord, SessionStore};

#[derive(Default)]
struct Tables {
    sessions: Vec<SessionRecord>,
    messages: HashMap<SessionId, Vec<MessageRecord>>,
}

/// Process-local store
#[derive(Default)]
pub struct MemorySessionStore {
    tables: Mutex<Tables>,
}

impl MemorySessionStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored session records, in insertion order
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.tables.lock().sessions.clone()
    }

    /// Stored messages of one session, in insertion order
    #[must_use]
    pub fn messages(&self, session_id: &SessionId) -> Vec<MessageRecord> {
        self.tables
            .lock()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save_session(&self, record: SessionRecord) -> BoxFuture<'_, bool> {
        let mut tables = self.tables.lock();
        tables.sessions.retain(|s| s.session_id != record.session_id);
        tables.sessions.push(record);
        drop(tables);
        async { true }.boxed()
    }

    fn save_message(&self, session_id: SessionId, record: MessageRecord) -> BoxFuture<'_, bool> {
        self.tables
            .lock()
            .messages
            .entry(session_id)
            .or_default()
            .push(record);
        async { true }.boxed()
    }

    fn load_sessions(&self) -> BoxFuture<'_, Vec<serde_json::Value>> {
        let tables = self.tables.lock();
        let records: Vec<_> = tables
            .sessions
            .iter()
            .filter_map(|record| {
                let mut value = serde_json::to_value(record).ok()?;
                let count = tables.messages.get(&record.session_id).map_or(0, Vec::len);
                value["message_count"] = serde_json::json!(count);
                Some(value)
            })
            .collect();
        drop(tables);
        async move { records }.boxed()
    }

    fn load_session_messages(
        &self,
        session_id: SessionId,
    ) -> BoxFuture<'_, Vec<serde_json::Value>> {
        let messages: Vec<_> = self
            .messages(&session_id)
            .iter()
            .filter_map(|m| serde_json::to_value(m).ok())
            .collect();
        async move { messages }.boxed()
    }
}
