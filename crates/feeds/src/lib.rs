//! Upstream balance feed for the Qubic balance tracker.
//!
//! This crate owns the single upstream dependency of the tracking core:
//! the ledger RPC balance endpoint. The fetcher absorbs every transient
//! failure into a fallback snapshot so the polling loop never has to
//! handle upstream errors.

pub mod error;
pub mod fetcher;

pub use error::FetchError;
pub use fetcher::{BalanceFetcher, BalanceSource, FetcherConfig};
