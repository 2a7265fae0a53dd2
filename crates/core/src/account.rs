//! Ledger account identity and balance snapshots.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a ledger account.
///
/// Account ids are treated as opaque strings: the tracker never inspects
/// their structure, it only uses them as map keys and upstream query
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(CompactString);

impl AccountId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Point-in-time balance observation for one account.
///
/// Balances stay decimal strings end to end; parsing to a float happens
/// only at comparison time in the change detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub id: AccountId,
    pub balance: String,
    #[serde(default)]
    pub valid_for_tick: u64,
}

impl BalanceSnapshot {
    /// The snapshot used when the upstream call fails for any reason.
    /// A zero balance with tick 0 keeps the tracking loop alive without
    /// poisoning the stored baseline (see the pending-initialization seed).
    pub fn fallback(id: AccountId) -> Self {
        Self {
            id,
            balance: "0".to_string(),
            valid_for_tick: 0,
        }
    }

    /// True when this is the placeholder produced by [`fallback`].
    ///
    /// [`fallback`]: BalanceSnapshot::fallback
    pub fn is_fallback(&self) -> bool {
        self.balance == "0" && self.valid_for_tick == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn account_id_is_transparent_in_json() {
        let id = AccountId::new("QUBICADDR01");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"QUBICADDR01\"");
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn fallback_snapshot_shape() {
        let snap = BalanceSnapshot::fallback(AccountId::new("A"));
        assert_eq!(snap.balance, "0");
        assert_eq!(snap.valid_for_tick, 0);
        assert!(snap.is_fallback());
    }

    #[test]
    fn snapshot_uses_camel_case_tick_field() {
        let snap = BalanceSnapshot {
            id: AccountId::new("A"),
            balance: "12.5".to_string(),
            valid_for_tick: 42,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["validForTick"], 42);
    }
}
