//! History Store client
//!
//! External collaborator that persists and returns past messages for a room.
//! Ordering is server-defined (assumed chronological) and trusted as-is; the
//! controller never re-sorts a seeded log.

use crate::model::{ChatMessage, RoomId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while talking to the history store
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Request could not be performed
    #[error("history request failed: {0}")]
    Request(String),

    /// Backend answered with a non-success status
    #[error("history request rejected with status {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("failed to decode history response: {0}")]
    Decode(String),
}

/// Trait for history stores
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Return the persisted messages for a room, oldest first
    async fn messages_for_room(&self, room: &RoomId) -> HistoryResult<Vec<ChatMessage>>;
}

/// HTTP history store against the job-board REST API
pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryStore {
    /// Create a new client against the given API base URL
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> HistoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HistoryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn messages_for_room(&self, room: &RoomId) -> HistoryResult<Vec<ChatMessage>> {
        let url = format!(
            "{}/api/messages/{}",
            self.base_url.trim_end_matches('/'),
            room
        );
        debug!(url = %url, "Fetching room history");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HistoryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status.as_u16()));
        }

        response
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|e| HistoryError::Decode(e.to_string()))
    }
}

/// Type alias for a shared history store
pub type HistoryStoreHandle = Arc<dyn HistoryStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::Status(502);
        assert_eq!(err.to_string(), "history request rejected with status 502");
    }
}
