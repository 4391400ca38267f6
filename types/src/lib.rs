//! Fundamental types for the LMNode masternode layer.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! hashes, collateral outpoints, keys, payee scripts, amounts, timestamps,
//! network parameters, and the masternode activity state.

pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod outpoint;
pub mod params;
pub mod script;
pub mod state;
pub mod time;
pub mod uint;

pub use address::{is_local_addr, is_routable_addr};
pub use amount::{Amount, COIN};
pub use block::BlockHash;
pub use error::LmnodeError;
pub use hash::TxHash;
pub use keys::{KeyId, KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use outpoint::Outpoint;
pub use params::{ConsensusParams, PROTOCOL_VERSION};
pub use script::{Script, PAY_TO_KEY_ID_LEN};
pub use state::MasternodeState;
pub use time::Timestamp;
pub use uint::{abs_diff, u256_from_le, u256_to_le, ToCompact, U256};
