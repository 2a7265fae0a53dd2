//! Telegram chat channel.

use crate::channel::{ChatChannel, DeliveryError};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::debug;

/// Chat delivery over the Telegram Bot API.
///
/// The bot token is optional: without one, every send is a logged no-op
/// rather than an error, so deployments that only use live push and email
/// run unchanged.
pub struct TelegramChannel {
    bot: Option<Bot>,
}

impl TelegramChannel {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            bot: token.map(Bot::new),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot.is_some()
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let Some(bot) = &self.bot else {
            debug!(chat_id, "No bot token configured, skipping chat message");
            return Ok(());
        };
        let chat: ChatId = ChatId(chat_id.parse().unwrap_or(0));
        bot.send_message(chat, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| DeliveryError::Chat(e.to_string()))?;
        Ok(())
    }
}
