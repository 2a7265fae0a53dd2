//! Balance fetcher for the ledger RPC.
//!
//! One contract matters here: `fetch` never fails outward. A network
//! error, timeout, non-200 response or payload without a balance object
//! all collapse into a fallback snapshot, because a single account's
//! upstream failure must never abort a polling pass or corrupt the state
//! of other tracked accounts.

use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracker_core::{AccountId, BalanceSnapshot};
use tracing::{debug, warn};

/// Per-call upstream timeout. Kept at a short fixed ceiling so a pass's
/// worst-case wall clock stays bounded by the number of tracked accounts.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of balance snapshots, the seam between the engine and the
/// network. The production implementation is [`BalanceFetcher`]; tests
/// script their own.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Fetch the current balance of one account. Infallible by contract:
    /// implementations return a fallback snapshot instead of erroring.
    async fn fetch(&self, id: &AccountId) -> BalanceSnapshot;
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL of the ledger RPC.
    pub base_url: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rpc.qubic.org".to_string(),
        }
    }
}

/// HTTP client for the ledger balance endpoint.
pub struct BalanceFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl BalanceFetcher {
    /// Create a fetcher against the given RPC base URL.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn balance_url(&self, id: &AccountId) -> String {
        format!("{}/v1/balances/{}", self.base_url, id)
    }

    /// Error-propagating fetch, used by the diagnostic probe endpoint and
    /// internally by `fetch`.
    async fn try_fetch(&self, id: &AccountId) -> Result<BalanceSnapshot, FetchError> {
        let url = self.balance_url(id);
        debug!(account = %id, url = %url, "Fetching balance");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        parse_balance_payload(id, &body)
    }

    /// Fetch the raw upstream response without any absorption. Backs the
    /// `/api/test-connection` diagnostic endpoint.
    pub async fn probe(&self, id: &AccountId) -> Result<Value, FetchError> {
        let url = self.balance_url(id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BalanceSource for BalanceFetcher {
    async fn fetch(&self, id: &AccountId) -> BalanceSnapshot {
        match self.try_fetch(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(account = %id, error = %e, "Balance fetch failed, using fallback snapshot");
                BalanceSnapshot::fallback(id.clone())
            }
        }
    }
}

/// Extract a snapshot from the RPC response body.
///
/// Expected shape: `{ "balance": { "id": ..., "balance": "...", "validForTick": ... } }`.
/// The balance value is accepted as either a JSON string or a number and
/// kept as a decimal string either way.
fn parse_balance_payload(requested: &AccountId, body: &Value) -> Result<BalanceSnapshot, FetchError> {
    let inner = body
        .get("balance")
        .ok_or_else(|| FetchError::MalformedPayload("no balance object".to_string()))?;

    let balance = match inner.get("balance") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(FetchError::MalformedPayload("no balance field".to_string())),
    };

    let id = inner
        .get("id")
        .and_then(Value::as_str)
        .map(AccountId::new)
        .unwrap_or_else(|| requested.clone());

    let valid_for_tick = inner
        .get("validForTick")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(BalanceSnapshot {
        id,
        balance,
        valid_for_tick,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_the_envelope_shape() {
        let id = AccountId::new("ACC");
        let body = json!({
            "balance": { "id": "ACC", "balance": "12345.67", "validForTick": 999 }
        });
        let snap = parse_balance_payload(&id, &body).unwrap();
        assert_eq!(snap.balance, "12345.67");
        assert_eq!(snap.valid_for_tick, 999);
        assert_eq!(snap.id, id);
    }

    #[test]
    fn numeric_balances_become_decimal_strings() {
        let id = AccountId::new("ACC");
        let body = json!({ "balance": { "balance": 42 } });
        let snap = parse_balance_payload(&id, &body).unwrap();
        assert_eq!(snap.balance, "42");
        // Missing id falls back to the requested one.
        assert_eq!(snap.id, id);
    }

    #[test]
    fn missing_balance_object_is_malformed() {
        let id = AccountId::new("ACC");
        let err = parse_balance_payload(&id, &json!({ "ok": true })).unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload(_)));

        let err = parse_balance_payload(&id, &json!({ "balance": {} })).unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn fetch_absorbs_connection_failures() {
        // Port 9 (discard) refuses connections immediately.
        let fetcher = BalanceFetcher::new(FetcherConfig {
            base_url: "http://127.0.0.1:9".to_string(),
        })
        .unwrap();
        let id = AccountId::new("ACC");
        let snap = fetcher.fetch(&id).await;
        assert_eq!(snap, BalanceSnapshot::fallback(id));
    }
}
