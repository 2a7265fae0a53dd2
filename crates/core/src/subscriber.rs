//! Subscriber identities.

use crate::subscription::RequestError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix marking legacy bot-only subscribers.
const CHAT_NAMESPACE: &str = "chat:";

/// Opaque identity of one notification recipient.
///
/// For live-push subscribers this is the server-assigned connection id.
/// Legacy bot-only subscribers carry a channel-qualified identity of the
/// form `chat:<chatId>`; the namespace makes the transport inferable, but
/// channel selection for regular subscribers is always driven by their
/// stored preferences, never by the id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(CompactString);

impl SubscriberId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    /// Validate a subscriber id arriving at the request boundary.
    pub fn parse(id: &str) -> Result<Self, RequestError> {
        if id.trim().is_empty() {
            return Err(RequestError::MissingSubscriberId);
        }
        Ok(Self::new(id))
    }

    /// Build the channel-qualified identity of a legacy bot-only subscriber.
    pub fn for_chat(chat_id: &str) -> Self {
        Self::new(format!("{CHAT_NAMESPACE}{chat_id}"))
    }

    /// The chat id of a legacy bot-only subscriber, if this identity lives
    /// in the `chat:` namespace.
    pub fn chat_target(&self) -> Option<&str> {
        self.0.strip_prefix(CHAT_NAMESPACE)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chat_namespace_roundtrip() {
        let id = SubscriberId::for_chat("123456");
        assert_eq!(id.as_str(), "chat:123456");
        assert_eq!(id.chat_target(), Some("123456"));
    }

    #[test]
    fn connection_ids_have_no_chat_target() {
        let id = SubscriberId::new("socket-42");
        assert_eq!(id.chat_target(), None);
    }

    #[test]
    fn parse_rejects_blank_ids() {
        assert_eq!(
            SubscriberId::parse("  "),
            Err(RequestError::MissingSubscriberId)
        );
        assert!(SubscriberId::parse("socket-1").is_ok());
    }
}
