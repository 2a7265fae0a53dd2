//! Subscription requests as they cross the service boundary.

use crate::{AccountId, DeliveryPreferences};
use thiserror::Error;

/// Rejections for malformed subscription and simulation requests.
/// These never reach the registry; handlers map them to 400 responses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing account id")]
    MissingAccountId,
    #[error("missing subscriber id")]
    MissingSubscriberId,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid direction: {0}")]
    InvalidDirection(String),
}

/// A normalized subscription request.
///
/// Clients speak two dialects: the plain one that names only an account,
/// and the newer one that also carries delivery preferences. Both are
/// normalized into this variant before the registry sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Basic(AccountId),
    WithPreferences(AccountId, DeliveryPreferences),
}

impl Subscription {
    /// Validate and normalize a raw request. Preferences that configure no
    /// channel collapse to the basic form.
    pub fn new(
        account_id: &str,
        preferences: Option<DeliveryPreferences>,
    ) -> Result<Self, RequestError> {
        if account_id.trim().is_empty() {
            return Err(RequestError::MissingAccountId);
        }
        let account = AccountId::new(account_id);
        Ok(match preferences {
            Some(prefs) if !prefs.is_empty() => Subscription::WithPreferences(account, prefs),
            _ => Subscription::Basic(account),
        })
    }

    pub fn account(&self) -> &AccountId {
        match self {
            Subscription::Basic(account) => account,
            Subscription::WithPreferences(account, _) => account,
        }
    }

    pub fn preferences(&self) -> Option<&DeliveryPreferences> {
        match self {
            Subscription::Basic(_) => None,
            Subscription::WithPreferences(_, prefs) => Some(prefs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_account_is_rejected() {
        assert_eq!(
            Subscription::new("", None),
            Err(RequestError::MissingAccountId)
        );
        assert_eq!(
            Subscription::new("   ", None),
            Err(RequestError::MissingAccountId)
        );
    }

    #[test]
    fn empty_preferences_normalize_to_basic() {
        let sub = Subscription::new("ACC", Some(DeliveryPreferences::default())).unwrap();
        assert_eq!(sub, Subscription::Basic(AccountId::new("ACC")));
        assert!(sub.preferences().is_none());
    }

    #[test]
    fn preferences_are_carried_through() {
        let prefs = DeliveryPreferences {
            email: Some("user@example.com".to_string()),
            chat_id: None,
        };
        let sub = Subscription::new("ACC", Some(prefs.clone())).unwrap();
        assert_eq!(sub.account(), &AccountId::new("ACC"));
        assert_eq!(sub.preferences(), Some(&prefs));
    }
}
