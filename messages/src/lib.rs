//! Signed masternode messages and the wire envelope.
//!
//! Each payload knows how to build the exact byte string its signer commits
//! to and how to derive its relay identity (`ObjectHash`). Validation against
//! registry or chain state lives in the engines, not here.

pub mod broadcast;
pub mod error;
pub mod inventory;
pub mod ping;
pub mod sync;
pub mod verification;
pub mod vote;
pub mod wire;

pub use broadcast::Broadcast;
pub use error::MessageError;
pub use inventory::{Inventory, ObjectHash, MAX_INV_SIZE};
pub use ping::Ping;
pub use sync::{SyncItem, SyncStatusCount};
pub use verification::{Verification, VerificationPhase};
pub use vote::PaymentVote;
pub use wire::WireMessage;
