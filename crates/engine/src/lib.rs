//! Tracking engine: subscription registry, change detection and the
//! polling loop.
//!
//! The engine owns the authoritative in-memory state (which accounts are
//! tracked and who watches them), persists the tracked id set through a
//! pluggable store, and drives the periodic balance sweep that hands
//! detected changes to a [`ChangeSink`].

pub mod detector;
pub mod monitor;
pub mod poller;
pub mod registry;
pub mod store;

pub use detector::{detect_change, BALANCE_EPSILON};
pub use monitor::{AccountCheck, MonitorLog, PassReport};
pub use poller::{ChangeSink, Poller, PollerConfig};
pub use registry::{PollEntry, Registry, TrackedAccount};
pub use store::{JsonFileStore, MemoryStore, StoreError, TrackedStore};
