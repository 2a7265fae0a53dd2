//! Balance change detection.
//!
//! Pure comparison logic, kept free of registry and I/O concerns so the
//! threshold semantics can be tested exhaustively.

use chrono::Utc;
use tracker_core::{ChangeEvent, Direction};

/// Tolerance absorbing floating-point noise from decimal-string
/// round-tripping. Deltas at or below this are not changes.
pub const BALANCE_EPSILON: f64 = 1e-6;

/// Compare a stored balance against a freshly fetched one.
///
/// Balances arrive as decimal strings; unparseable values are treated as
/// zero, matching the tolerant upstream contract. Returns `None` when the
/// absolute delta is within [`BALANCE_EPSILON`], otherwise a fully
/// populated event with the difference rendered at fixed 6-decimal
/// precision.
pub fn detect_change(old_balance: &str, new_balance: &str) -> Option<ChangeEvent> {
    let old = old_balance.parse::<f64>().unwrap_or(0.0);
    let new = new_balance.parse::<f64>().unwrap_or(0.0);

    let delta = new - old;
    if delta.abs() <= BALANCE_EPSILON {
        return None;
    }

    let direction = if delta > 0.0 {
        Direction::Incoming
    } else {
        Direction::Outgoing
    };

    Some(ChangeEvent {
        old_balance: old_balance.to_string(),
        new_balance: new_balance.to_string(),
        difference: format!("{:.6}", delta.abs()),
        direction,
        timestamp: Utc::now(),
        simulated: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sub_epsilon_noise_is_not_a_change() {
        assert!(detect_change("100.000000", "100.0000001").is_none());
        assert!(detect_change("100", "100").is_none());
        assert!(detect_change("0", "0.000001").is_none());
    }

    #[test]
    fn increase_is_incoming_with_fixed_precision() {
        let event = detect_change("100", "150").unwrap();
        assert_eq!(event.direction, Direction::Incoming);
        assert_eq!(event.difference, "50.000000");
        assert_eq!(event.old_balance, "100");
        assert_eq!(event.new_balance, "150");
        assert!(!event.simulated);
    }

    #[test]
    fn decrease_is_outgoing_with_fixed_precision() {
        let event = detect_change("100", "40").unwrap();
        assert_eq!(event.direction, Direction::Outgoing);
        assert_eq!(event.difference, "60.000000");
    }

    #[test]
    fn unparseable_balances_count_as_zero() {
        // A garbage baseline against a real balance reads as incoming.
        let event = detect_change("not-a-number", "25").unwrap();
        assert_eq!(event.direction, Direction::Incoming);
        assert_eq!(event.difference, "25.000000");
    }

    #[test]
    fn fractional_deltas_keep_six_decimals() {
        let event = detect_change("10", "10.5").unwrap();
        assert_eq!(event.difference, "0.500000");
    }
}
