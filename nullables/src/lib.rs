//! Nullable infrastructure for deterministic testing.
//!
//! Every host collaborator of the masternode layer (clock, base chain, peer
//! network, sporks, sync state, randomness) is abstracted behind a trait.
//! This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record outbound effects for assertions
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod clock;
pub mod network;
pub mod random;
pub mod spork;
pub mod sync_status;

pub use chain::NullChain;
pub use clock::NullClock;
pub use network::NullNetwork;
pub use random::NullRandom;
pub use spork::NullSporks;
pub use sync_status::NullSyncStatus;
