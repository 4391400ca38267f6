//! Inventory announcements and object identities.

use lmnode_types::BlockHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of inventory entries carried by one `Inventory`/`GetData` message.
pub const MAX_INV_SIZE: usize = 50_000;

/// Relay identity of a gossiped object (broadcast, ping, vote, verification).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ObjectHash(pub [u8; 32]);

impl ObjectHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One inventory entry: a typed pointer to an object a peer can fetch with `GetData`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inventory {
    Announce(ObjectHash),
    Ping(ObjectHash),
    PaymentVote(ObjectHash),
    /// All votes for the block at the height of this hash.
    PaymentBlock(BlockHash),
    Verify(ObjectHash),
}

impl Inventory {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Announce(_) => "announce",
            Self::Ping(_) => "ping",
            Self::PaymentVote(_) => "payment-vote",
            Self::PaymentBlock(_) => "payment-block",
            Self::Verify(_) => "verify",
        }
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Announce(h) | Self::Ping(h) | Self::PaymentVote(h) | Self::Verify(h) => {
                write!(f, "{} {}", self.kind(), h)
            }
            Self::PaymentBlock(h) => write!(f, "{} {}", self.kind(), h),
        }
    }
}
