//! Masternode payment consensus.
//!
//! Ranked masternodes vote for the payee of each upcoming block. The ledger
//! counts those votes per height and decides whether a coinbase pays the
//! masternode the network agreed on.

pub mod block;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod payee;
pub mod sync;
pub mod vote;

pub use block::{is_block_value_valid, total_value};
pub use error::{PaymentError, PaymentRejectReason, PaymentRejection};
pub use ledger::{PaymentLedger, StoredVote, PAYMENTS_SNAPSHOT_VERSION};
pub use payee::{BlockPayees, Payee};
