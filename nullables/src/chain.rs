//! Nullable chain: an in-memory active chain and UTXO set.

use lmnode_chain::{ChainError, ChainView, TxOut, Utxo};
use lmnode_crypto::blake2b_256;
use lmnode_types::{BlockHash, Outpoint, Timestamp};
use std::collections::HashMap;
use std::sync::Mutex;

struct NullBlock {
    hash: BlockHash,
    time: Timestamp,
    coinbase: Vec<TxOut>,
}

#[derive(Default)]
struct State {
    blocks: Vec<NullBlock>,
    utxos: HashMap<Outpoint, Utxo>,
    best_header: Option<u32>,
    importing: bool,
}

/// A deterministic base chain for testing.
///
/// Block `h` has hash `blake2b(h)` and the time given when it was pushed.
/// Height 0 is the first block pushed.
#[derive(Default)]
pub struct NullChain {
    state: Mutex<State>,
}

impl NullChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain of `count` blocks spaced `spacing` seconds apart, starting at `start_time`.
    pub fn with_blocks(count: u32, start_time: u64, spacing: u64) -> Self {
        let chain = Self::new();
        chain.extend(count, start_time, spacing);
        chain
    }

    /// Deterministic hash of the block at `height`.
    pub fn hash_for(height: u32) -> BlockHash {
        BlockHash::new(blake2b_256(&height.to_le_bytes()))
    }

    pub fn push_block(&self, time: u64) -> BlockHash {
        self.push_block_with_coinbase(time, Vec::new())
    }

    pub fn push_block_with_coinbase(&self, time: u64, coinbase: Vec<TxOut>) -> BlockHash {
        let mut state = self.state.lock().unwrap();
        let hash = Self::hash_for(state.blocks.len() as u32);
        state.blocks.push(NullBlock {
            hash,
            time: Timestamp::new(time),
            coinbase,
        });
        hash
    }

    pub fn extend(&self, count: u32, start_time: u64, spacing: u64) {
        for i in 0..u64::from(count) {
            self.push_block(start_time + i * spacing);
        }
    }

    pub fn set_coinbase(&self, height: u32, outputs: Vec<TxOut>) {
        if let Some(block) = self.state.lock().unwrap().blocks.get_mut(height as usize) {
            block.coinbase = outputs;
        }
    }

    pub fn add_utxo(&self, outpoint: Outpoint, utxo: Utxo) {
        self.state.lock().unwrap().utxos.insert(outpoint, utxo);
    }

    pub fn spend(&self, outpoint: &Outpoint) {
        self.state.lock().unwrap().utxos.remove(outpoint);
    }

    pub fn set_best_header(&self, height: Option<u32>) {
        self.state.lock().unwrap().best_header = height;
    }

    pub fn set_importing(&self, importing: bool) {
        self.state.lock().unwrap().importing = importing;
    }
}

impl ChainView for NullChain {
    fn tip_height(&self) -> Option<u32> {
        let len = self.state.lock().unwrap().blocks.len();
        (len as u32).checked_sub(1)
    }

    fn block_hash(&self, height: u32) -> Option<BlockHash> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(height as usize)
            .map(|b| b.hash)
    }

    fn block_height(&self, hash: &BlockHash) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .position(|b| b.hash == *hash)
            .map(|h| h as u32)
    }

    fn block_time(&self, height: u32) -> Option<Timestamp> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(height as usize)
            .map(|b| b.time)
    }

    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<Utxo>, ChainError> {
        Ok(self.state.lock().unwrap().utxos.get(outpoint).cloned())
    }

    fn coinbase_outputs(&self, height: u32) -> Result<Vec<TxOut>, ChainError> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(height as usize)
            .map(|b| b.coinbase.clone())
            .ok_or(ChainError::BlockNotFound(height))
    }

    fn best_header_height(&self) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state
            .best_header
            .or_else(|| (state.blocks.len() as u32).checked_sub(1))
    }

    fn is_importing(&self) -> bool {
        self.state.lock().unwrap().importing
    }
}
