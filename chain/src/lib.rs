//! Abstract host traits for the masternode layer.
//!
//! The base chain, spork manager, clock and sync state are owned by the host
//! node. The registry, payment ledger, verifier and sync orchestrator depend
//! only on these traits; `lmnode-nullables` provides test implementations.

pub mod chain;
pub mod clock;
pub mod error;
pub mod random;
pub mod spork;
pub mod sync_status;

pub use chain::{ChainView, TxOut, Utxo};
pub use clock::{Clock, SystemClock};
pub use error::ChainError;
pub use random::{Random, ThreadRandom};
pub use spork::{SporkId, SporkView};
pub use sync_status::SyncStatus;
