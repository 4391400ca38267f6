//! Append-only collateral → index map.
//!
//! Indexes are handed out sequentially and never reused, so a stale index
//! can never point at a different masternode. The map only shrinks when the
//! registry rebuilds it from the live records.

use lmnode_types::Outpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeIndex {
    by_outpoint: HashMap<Outpoint, usize>,
    by_index: HashMap<usize, Outpoint>,
}

impl MasternodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next index to `outpoint` unless it already has one.
    pub fn add(&mut self, outpoint: Outpoint) {
        if self.by_outpoint.contains_key(&outpoint) {
            return;
        }
        let next = self.by_outpoint.len();
        self.by_outpoint.insert(outpoint, next);
        self.by_index.insert(next, outpoint);
    }

    pub fn index_of(&self, outpoint: &Outpoint) -> Option<usize> {
        self.by_outpoint.get(outpoint).copied()
    }

    pub fn outpoint_at(&self, index: usize) -> Option<Outpoint> {
        self.by_index.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.by_outpoint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_outpoint.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_outpoint.clear();
        self.by_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmnode_types::TxHash;

    fn op(b: u8) -> Outpoint {
        Outpoint::new(TxHash::new([b; 32]), 0)
    }

    #[test]
    fn indexes_are_sequential_and_stable() {
        let mut index = MasternodeIndex::new();
        index.add(op(1));
        index.add(op(2));
        index.add(op(1));
        assert_eq!(index.len(), 2);
        assert_eq!(index.index_of(&op(1)), Some(0));
        assert_eq!(index.index_of(&op(2)), Some(1));
        assert_eq!(index.outpoint_at(1), Some(op(2)));
        assert_eq!(index.outpoint_at(2), None);
    }
}
