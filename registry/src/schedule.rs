//! The registry's narrow view of the payment ledger.

use lmnode_types::Script;

/// What the registry needs to know about recorded payment votes.
///
/// Implemented by the payment ledger; the registry never depends on it directly.
pub trait PaymentSchedule {
    /// Whether `payee` is the best-voted payee of any block in `tip..=tip + 8`
    /// other than `not_height`.
    fn is_scheduled(&self, payee: &Script, not_height: u32, tip: u32) -> bool;

    /// Whether the block at `height` has at least `min_votes` votes for `payee`.
    fn has_payee_with_votes(&self, height: u32, payee: &Script, min_votes: usize) -> bool;
}
