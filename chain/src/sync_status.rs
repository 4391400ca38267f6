//! Read side of the sync orchestrator, as seen by the engines it feeds.

/// Sync progress queries plus the two "data arrived" notifications that
/// extend the list and payment timeouts.
///
/// Implementations must be callable while the registry or payment ledger
/// lock is held.
pub trait SyncStatus: Send + Sync {
    fn is_blockchain_synced(&self) -> bool;
    fn is_list_synced(&self) -> bool;
    fn is_winners_list_synced(&self) -> bool;
    fn is_synced(&self) -> bool;

    /// A new or updated masternode entry was accepted.
    fn added_list_item(&self);

    /// A new payment vote was accepted.
    fn added_payment_vote(&self);
}
