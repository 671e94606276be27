pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;

/// A chat message carried by an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Send time, seconds since the Unix epoch
    pub timestamp: i64,
    pub chat_id: i64,
    pub from_user_id: i64,
    pub text: String,
}

/// One entry of the update feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: i64,
    /// `None` for updates that do not carry a text message
    pub message: Option<Message>,
}

impl Update {
    pub fn new(id: i64, message: Option<Message>) -> Self {
        Self { id, message }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The feed could not be reached (network, DNS, TLS, I/O)
    #[error("transport error: {0}")]
    Transport(String),
    /// The feed answered with an error (bad token, rate limit, ...)
    #[error("api error: {0}")]
    Api(String),
    /// Flood control; the feed must not be asked again before the delay passes
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    /// The feed answered with something that cannot be used as a batch
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FeedError {
    /// Minimum wait the feed asked for before the next request
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimited(delay) => Some(*delay),
            _ => None,
        }
    }
}

/// Long-poll source of updates.
///
/// Implementations return updates in ascending id order and an empty batch
/// when `timeout` elapses without new data.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(
        &self,
        offset: i64,
        limit: u8,
        timeout: Duration,
    ) -> Result<Vec<Update>, FeedError>;
}
