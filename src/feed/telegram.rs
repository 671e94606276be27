use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::requests::Requester;
use teloxide::types::{Message as TgMessage, Update as TgUpdate, UpdateKind};
use teloxide::{Bot, RequestError};
use tracing::debug;

use super::{FeedClient, FeedError, Message, Update};

/// Headroom on top of the long-poll wait before the HTTP client gives up
const HTTP_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API `getUpdates` feed
pub struct TelegramFeed {
    bot: Bot,
}

impl TelegramFeed {
    /// Build a feed whose HTTP timeout outlasts a long-poll of `poll_timeout`.
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + HTTP_GRACE)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            bot: Bot::with_client(token, client),
        })
    }
}

#[async_trait]
impl FeedClient for TelegramFeed {
    async fn fetch(
        &self,
        offset: i64,
        limit: u8,
        timeout: Duration,
    ) -> Result<Vec<Update>, FeedError> {
        let api_offset = i32::try_from(offset).map_err(|_| {
            FeedError::Malformed(format!("offset {} does not fit the Bot API range", offset))
        })?;
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);

        debug!(
            "getUpdates offset={} limit={} timeout={}s",
            api_offset, limit, timeout_secs
        );

        let updates = self
            .bot
            .get_updates()
            .offset(api_offset)
            .limit(limit)
            .timeout(timeout_secs)
            .await
            .map_err(classify_error)?;

        Ok(updates.into_iter().map(convert_update).collect())
    }
}

fn classify_error(err: RequestError) -> FeedError {
    match &err {
        RequestError::Network(_) | RequestError::Io(_) => FeedError::Transport(err.to_string()),
        RequestError::InvalidJson { .. } => FeedError::Malformed(err.to_string()),
        RequestError::RetryAfter(wait) => FeedError::RateLimited(wait.duration()),
        _ => FeedError::Api(err.to_string()),
    }
}

fn convert_update(update: TgUpdate) -> Update {
    let id = i64::from(update.id.0);
    let message = match &update.kind {
        UpdateKind::Message(msg) => text_message(msg),
        _ => None,
    };

    if message.is_none() {
        debug!("Update {} carries no text message", id);
    }

    Update::new(id, message)
}

/// Extract the loggable part of a message; `None` unless it has text and a sender.
fn text_message(msg: &TgMessage) -> Option<Message> {
    let text = msg.text().filter(|t| !t.is_empty())?;
    let sender = msg.from.as_ref()?;

    Some(Message {
        timestamp: msg.date.timestamp(),
        chat_id: msg.chat.id.0,
        from_user_id: i64::try_from(sender.id.0).ok()?,
        text: text.to_string(),
    })
}
