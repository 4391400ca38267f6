//! Nullable sync status: fixed flags plus notification counters.

use lmnode_chain::SyncStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct NullSyncStatus {
    blockchain: AtomicBool,
    list: AtomicBool,
    winners: AtomicBool,
    list_items: AtomicU64,
    payment_votes: AtomicU64,
}

impl NullSyncStatus {
    /// Everything synced.
    pub fn synced() -> Self {
        Self::with(true, true, true)
    }

    /// Nothing synced.
    pub fn unsynced() -> Self {
        Self::with(false, false, false)
    }

    pub fn with(blockchain: bool, list: bool, winners: bool) -> Self {
        Self {
            blockchain: AtomicBool::new(blockchain),
            list: AtomicBool::new(list),
            winners: AtomicBool::new(winners),
            list_items: AtomicU64::new(0),
            payment_votes: AtomicU64::new(0),
        }
    }

    pub fn set_blockchain_synced(&self, v: bool) {
        self.blockchain.store(v, Ordering::SeqCst);
    }

    pub fn set_list_synced(&self, v: bool) {
        self.list.store(v, Ordering::SeqCst);
    }

    pub fn set_winners_synced(&self, v: bool) {
        self.winners.store(v, Ordering::SeqCst);
    }

    /// How many times `added_list_item` was called.
    pub fn list_items(&self) -> u64 {
        self.list_items.load(Ordering::SeqCst)
    }

    /// How many times `added_payment_vote` was called.
    pub fn payment_votes(&self) -> u64 {
        self.payment_votes.load(Ordering::SeqCst)
    }
}

impl SyncStatus for NullSyncStatus {
    fn is_blockchain_synced(&self) -> bool {
        self.blockchain.load(Ordering::SeqCst)
    }

    fn is_list_synced(&self) -> bool {
        self.list.load(Ordering::SeqCst)
    }

    fn is_winners_list_synced(&self) -> bool {
        self.winners.load(Ordering::SeqCst)
    }

    fn is_synced(&self) -> bool {
        self.is_blockchain_synced() && self.is_list_synced() && self.is_winners_list_synced()
    }

    fn added_list_item(&self) {
        self.list_items.fetch_add(1, Ordering::SeqCst);
    }

    fn added_payment_vote(&self) {
        self.payment_votes.fetch_add(1, Ordering::SeqCst);
    }
}
