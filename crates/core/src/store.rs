//! Durable message storage behind the chat side-channel
//!
//! The REST API is the durability path for chat; relay delivery is the
//! low-latency path. Failures here are reported, never fatal to the
//! signaling session.

use crate::chat::{ChatMessage, ReadReceipt};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Durable storage for chat messages and read state
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message
    async fn save_message(&self, message: &ChatMessage) -> Result<()>;

    /// Record that `reader_id` has read the session's messages
    async fn mark_read(&self, session_id: &str, reader_id: &str) -> Result<()>;

    /// Fetch the session's persisted messages, oldest first
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

/// REST-backed [`MessageStore`]
pub struct HttpMessageStore {
    client: Client,
    base_url: String,
}

impl HttpMessageStore {
    /// Default request timeout
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a store against `base_url` (e.g. `https://host/api`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Create a store with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::PersistenceFailed(format!("Failed to create HTTP client: {}", e)))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    fn messages_url(&self, session_id: &str) -> String {
        format!("{}/sessions/{}/messages", self.base_url, session_id)
    }

    fn read_url(&self, session_id: &str) -> String {
        format!("{}/sessions/{}/read", self.base_url, session_id)
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<()> {
        let url = self.messages_url(&message.session_id);
        debug!("Persisting message {} to {}", message.id, url);

        self.client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|e| Error::PersistenceFailed(format!("Message POST failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::PersistenceFailed(format!("Message POST rejected: {}", e)))?;

        Ok(())
    }

    async fn mark_read(&self, session_id: &str, reader_id: &str) -> Result<()> {
        let receipt = ReadReceipt {
            session_id: session_id.to_string(),
            reader_id: reader_id.to_string(),
        };

        self.client
            .post(self.read_url(session_id))
            .json(&receipt)
            .send()
            .await
            .map_err(|e| Error::PersistenceFailed(format!("Read receipt POST failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::PersistenceFailed(format!("Read receipt POST rejected: {}", e)))?;

        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let response = self
            .client
            .get(self.messages_url(session_id))
            .send()
            .await
            .map_err(|e| Error::PersistenceFailed(format!("History GET failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::PersistenceFailed(format!("History GET rejected: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| Error::PersistenceFailed(format!("History decode failed: {}", e)))
    }
}
