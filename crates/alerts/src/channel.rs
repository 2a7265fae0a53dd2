//! Delivery channel contracts.
//!
//! The dispatcher only sees these traits; concrete transports (the
//! websocket connection table, Telegram, the HTTP mail relay) live behind
//! them so delivery logic can be tested without any network.

use async_trait::async_trait;
use thiserror::Error;
use tracker_core::{AccountId, ChangeEvent, SubscriberId};

/// A single failed delivery. Always logged by the dispatcher and never
/// propagated: one broken channel must not starve the others.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("live push failed: {0}")]
    Push(String),
    #[error("email delivery failed: {0}")]
    Email(String),
    #[error("chat delivery failed: {0}")]
    Chat(String),
}

/// Push channel backed by the subscriber's live connection.
#[async_trait]
pub trait LivePush: Send + Sync {
    /// Whether the subscriber's connection is still open. Checked before
    /// every delivery; a dead connection triggers the registry prune.
    fn is_active(&self, subscriber: &SubscriberId) -> bool;

    async fn push(
        &self,
        subscriber: &SubscriberId,
        account: &AccountId,
        event: &ChangeEvent,
    ) -> Result<(), DeliveryError>;
}

/// Email delivery, addressed per message.
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str)
        -> Result<(), DeliveryError>;
}

/// Chat-bot delivery, addressed by an opaque chat id.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError>;
}
