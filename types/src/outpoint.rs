//! Collateral reference: the transaction output locked by a masternode.

use crate::hash::TxHash;
use crate::uint::{u256_from_le, u256_to_le, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a transaction output (`txid`, `index`).
///
/// Ordering is by txid first, then index. The registry uses this ordering
/// to break ties in the payment queue and in score rankings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: TxHash,
    pub index: u32,
}

impl Outpoint {
    /// The null outpoint. A list request carrying it asks for the whole list.
    pub const NULL: Self = Self {
        txid: TxHash::ZERO,
        index: u32::MAX,
    };

    pub fn new(txid: TxHash, index: u32) -> Self {
        Self { txid, index }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }

    /// `txid + index` as a 256-bit little-endian integer, used as the score salt.
    pub fn score_salt(&self) -> [u8; 32] {
        let (salt, _) = u256_from_le(self.txid.as_bytes()).overflowing_add(U256::from(self.index));
        u256_to_le(&salt)
    }

    /// Canonical byte encoding used inside signed messages and hashes.
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(self.txid.as_bytes());
        out[32..].copy_from_slice(&self.index.to_le_bytes());
        out
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.txid, self.index)
    }
}
