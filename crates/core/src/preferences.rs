//! Per-subscriber delivery channel configuration.

use serde::{Deserialize, Serialize};

/// Delivery channels a subscriber opted into beyond the default live push.
///
/// An absent preference record means live-push only; an absent field means
/// that channel is not used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPreferences {
    /// Email recipient address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Chat-bot target (e.g. a Telegram chat id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl DeliveryPreferences {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.chat_id.is_none()
    }
}
