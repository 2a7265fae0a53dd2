//! Balance change events.

use crate::subscription::RequestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a detected balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

impl FromStr for Direction {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(RequestError::InvalidDirection(other.to_string())),
        }
    }
}

/// Transport-agnostic record of one detected balance change.
///
/// The wire shape (camelCase, `type` for the direction) matches what
/// live-push clients receive in `transactionDetected` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub old_balance: String,
    pub new_balance: String,
    /// Absolute difference, rendered with fixed 6-decimal precision.
    pub difference: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    /// Set only by the transaction simulation endpoint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub simulated: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}
