//! Read-only view of the base chain.

use crate::ChainError;
use lmnode_types::{Amount, BlockHash, Outpoint, Script, Timestamp};
use serde::{Deserialize, Serialize};

/// An unspent output as seen by the UTXO set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub value: Amount,
    pub script: Script,
    /// Height of the block that created the output.
    pub height: u32,
}

/// A transaction output (used for coinbase inspection).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub script: Script,
    pub value: Amount,
}

impl TxOut {
    pub fn new(script: Script, value: Amount) -> Self {
        Self { script, value }
    }
}

/// Trait for base-chain queries.
///
/// Height and hash lookups are cheap in-memory index reads and return
/// `None` for unknown blocks. UTXO and block-body reads may hit disk and
/// return `Result`.
pub trait ChainView: Send + Sync {
    /// Height of the active tip, `None` before genesis is loaded.
    fn tip_height(&self) -> Option<u32>;

    /// Hash of the active-chain block at `height`.
    fn block_hash(&self, height: u32) -> Option<BlockHash>;

    /// Height of a block on the active chain.
    fn block_height(&self, hash: &BlockHash) -> Option<u32>;

    /// Header time of the active-chain block at `height`.
    fn block_time(&self, height: u32) -> Option<Timestamp>;

    /// Look up an unspent output.
    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<Utxo>, ChainError>;

    /// Coinbase outputs of the active-chain block at `height`.
    fn coinbase_outputs(&self, height: u32) -> Result<Vec<TxOut>, ChainError>;

    /// Height of the best known header (may be ahead of the tip).
    fn best_header_height(&self) -> Option<u32>;

    /// Whether the node is importing or reindexing blocks.
    fn is_importing(&self) -> bool;

    /// Convenience: the tip hash.
    fn tip_hash(&self) -> Option<BlockHash> {
        self.tip_height().and_then(|h| self.block_hash(h))
    }
}
