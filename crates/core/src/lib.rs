//! Core data types for the Qubic balance tracker.

pub mod account;
pub mod event;
pub mod preferences;
pub mod subscriber;
pub mod subscription;

pub use account::*;
pub use event::*;
pub use preferences::*;
pub use subscriber::*;
pub use subscription::*;
