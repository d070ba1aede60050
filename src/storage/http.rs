//! Storage service client over HTTP

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::types::SessionId;

use super::{MessageRecord, SessionRecord, SessionStore};

#[derive(Deserialize)]
struct SessionsEnvelope {
    #[serde(default)]
    sessions: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct MessagesEnvelope {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

/// Client for the `/api/agent-sessions` storage service
pub struct HttpSessionStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSessionStore {
    /// Create a client for `base_url` (`.../api/agent-sessions`).
    ///
    /// Certificate verification is disabled; the local service uses a
    /// self-signed certificate.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        if api_key.is_none() {
            log::warn!("No API key found - storage requests will not be authenticated");
        }
        log::info!("Persistence client initialized: {base_url}");

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a client from gateway configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &GatewayConfig, api_key: Option<String>) -> Result<Self> {
        Self::new(config.storage_base_url(), api_key, config.storage_timeout())
    }

    /// Collection URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::OK {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::persistence(format!("{status} - {body}")))
    }

    async fn try_save_session(&self, record: &SessionRecord) -> Result<()> {
        self.send(self.client.post(&self.base_url).json(record))
            .await
            .map(|_| ())
    }

    async fn try_save_message(&self, session_id: &SessionId, record: &MessageRecord) -> Result<()> {
        let url = format!("{}/{session_id}/messages", self.base_url);
        self.send(self.client.post(url).json(record)).await.map(|_| ())
    }

    async fn try_load_sessions(&self) -> Result<Vec<serde_json::Value>> {
        let response = self.send(self.client.get(&self.base_url)).await?;
        Ok(response.json::<SessionsEnvelope>().await?.sessions)
    }

    async fn try_load_messages(&self, session_id: &SessionId) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/{session_id}", self.base_url);
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json::<MessagesEnvelope>().await?.messages)
    }
}

impl SessionStore for HttpSessionStore {
    fn save_session(&self, record: SessionRecord) -> BoxFuture<'_, bool> {
        async move {
            match self.try_save_session(&record).await {
                Ok(()) => {
                    log::debug!("Saved session {} to storage", record.session_id);
                    true
                }
                Err(e) => {
                    log::warn!("Failed to save session {}: {e}", record.session_id);
                    false
                }
            }
        }
        .boxed()
    }

    fn save_message(&self, session_id: SessionId, record: MessageRecord) -> BoxFuture<'_, bool> {
        async move {
            match self.try_save_message(&session_id, &record).await {
                Ok(()) => {
                    log::debug!(
                        "Saved message {} ({}) for session {session_id}",
                        record.message_id,
                        record.role
                    );
                    true
                }
                Err(e) => {
                    log::error!(
                        "Failed to save message {} for session {session_id}: {e}",
                        record.message_id
                    );
                    false
                }
            }
        }
        .boxed()
    }

    fn load_sessions(&self) -> BoxFuture<'_, Vec<serde_json::Value>> {
        async move {
            match self.try_load_sessions().await {
                Ok(sessions) => {
                    log::info!("Loaded {} active sessions from storage", sessions.len());
                    sessions
                }
                Err(e) => {
                    log::warn!("Error loading sessions from storage: {e}");
                    Vec::new()
                }
            }
        }
        .boxed()
    }

    fn load_session_messages(
        &self,
        session_id: SessionId,
    ) -> BoxFuture<'_, Vec<serde_json::Value>> {
        async move {
            match self.try_load_messages(&session_id).await {
                Ok(messages) => {
                    log::debug!("Loaded {} messages for session {session_id}", messages.len());
                    messages
                }
                Err(e) => {
                    log::warn!("Error loading messages for session {session_id}: {e}");
                    Vec::new()
                }
            }
        }
        .boxed()
    }
}
