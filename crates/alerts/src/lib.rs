//! Notification delivery: channel contracts, message formatting and the
//! dispatcher that fans a balance change out to an account's subscribers.

pub mod channel;
pub mod dispatcher;
pub mod format;
pub mod mail;
pub mod telegram;

pub use channel::{ChatChannel, DeliveryError, EmailChannel, LivePush};
pub use dispatcher::Dispatcher;
pub use format::{format_chat_message, format_email};
pub use mail::MailRelayChannel;
pub use telegram::TelegramChannel;
