//! Error types for upstream balance fetches.

use thiserror::Error;

/// Errors that can occur while querying the ledger RPC.
///
/// Inside the polling path these are absorbed into fallback snapshots;
/// they only surface through the diagnostic `probe` call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status: HTTP {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl FetchError {
    /// Returns true if this error is transient and a later poll is likely
    /// to succeed without any intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Http(_) | FetchError::Timeout | FetchError::Status(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_is_not_transient() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Status(502).is_transient());
        assert!(!FetchError::MalformedPayload("no balance".to_string()).is_transient());
    }
}
