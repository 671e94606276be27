use std::sync::Arc;

use chrono::DateTime;
use tracing::debug;

use crate::feed::Update;
use crate::store::{MessageStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to store message of update {update_id}")]
    Store {
        update_id: i64,
        #[source]
        source: StoreError,
    },
}

/// Writes the text message of each update to the store
pub struct UpdateProcessor {
    store: Arc<dyn MessageStore>,
}

impl UpdateProcessor {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Store the update's message, if it has one. Failures are returned, never retried.
    pub async fn process(&self, update: &Update) -> Result<(), ProcessError> {
        let message = match &update.message {
            Some(m) if !m.text.is_empty() => m,
            _ => return Ok(()),
        };

        self.store
            .append(message)
            .await
            .map_err(|source| ProcessError::Store {
                update_id: update.id,
                source,
            })?;

        let sent_at = DateTime::from_timestamp(message.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| message.timestamp.to_string());
        debug!(
            "Stored update {} (chat {}, user {}, sent {})",
            update.id, message.chat_id, message.from_user_id, sent_at
        );
        Ok(())
    }
}
