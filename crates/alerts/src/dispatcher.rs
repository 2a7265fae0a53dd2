//! Fan-out of detected balance changes to an account's subscribers.

use crate::channel::{ChatChannel, EmailChannel, LivePush};
use crate::format::{format_chat_message, format_email};
use async_trait::async_trait;
use std::sync::Arc;
use tracker_core::{AccountId, ChangeEvent};
use tracker_engine::{ChangeSink, Registry};
use tracing::{debug, error, info, warn};

/// Walks an account's subscriber snapshot and delivers one event across
/// the configured channels.
///
/// Delivery order per subscriber: liveness check (with prune on a dead
/// connection, before anything is sent), then push, then the optional
/// email and chat preferences. Channel failures are logged and isolated;
/// a subscriber never loses one channel because another one failed.
pub struct Dispatcher {
    registry: Arc<Registry>,
    live: Arc<dyn LivePush>,
    email: Option<Arc<dyn EmailChannel>>,
    chat: Arc<dyn ChatChannel>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        live: Arc<dyn LivePush>,
        email: Option<Arc<dyn EmailChannel>>,
        chat: Arc<dyn ChatChannel>,
    ) -> Self {
        Self {
            registry,
            live,
            email,
            chat,
        }
    }

    /// Deliver one event to every current subscriber of the account.
    /// Returns the number of successful channel deliveries.
    pub async fn dispatch(&self, account: &AccountId, event: &ChangeEvent) -> u32 {
        // Point-in-time snapshot: prunes during the walk must not disturb
        // the iteration.
        let subscribers = self.registry.subscribers_of(account).await;
        let mut delivered = 0u32;

        for subscriber in subscribers {
            // Legacy bot-only identities get exactly one chat message and
            // never consult the preference map.
            if let Some(chat_id) = subscriber.chat_target() {
                let text = format_chat_message(account, event);
                match self.chat.send(chat_id, &text).await {
                    Ok(_) => {
                        info!(chat_id, account = %account, "Chat notification sent");
                        delivered += 1;
                    }
                    Err(e) => error!(chat_id, error = %e, "Failed to send chat notification"),
                }
                continue;
            }

            if !self.live.is_active(&subscriber) {
                warn!(
                    subscriber = %subscriber,
                    account = %account,
                    "Connection gone, pruning subscriber"
                );
                self.registry.prune_subscriber(account, &subscriber).await;
                continue;
            }

            match self.live.push(&subscriber, account, event).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    error!(subscriber = %subscriber, error = %e, "Failed to push notification")
                }
            }

            let Some(prefs) = self.registry.preferences_of(account, &subscriber).await else {
                continue;
            };

            if let Some(to) = prefs.email.as_deref() {
                match &self.email {
                    Some(channel) => {
                        let (subject, text, html) = format_email(account, event);
                        match channel.send(to, &subject, &text, &html).await {
                            Ok(_) => {
                                info!(to, account = %account, "Email notification sent");
                                delivered += 1;
                            }
                            Err(e) => error!(to, error = %e, "Failed to send email notification"),
                        }
                    }
                    None => debug!(to, "No mail relay configured, skipping email notification"),
                }
            }

            if let Some(chat_id) = prefs.chat_id.as_deref() {
                let text = format_chat_message(account, event);
                match self.chat.send(chat_id, &text).await {
                    Ok(_) => {
                        info!(chat_id, account = %account, "Chat notification sent");
                        delivered += 1;
                    }
                    Err(e) => error!(chat_id, error = %e, "Failed to send chat notification"),
                }
            }
        }

        delivered
    }
}

#[async_trait]
impl ChangeSink for Dispatcher {
    async fn on_change(&self, account: &AccountId, event: &ChangeEvent) {
        let delivered = self.dispatch(account, event).await;
        debug!(account = %account, delivered, "Change dispatched");
    }
}
