//! Quorum and window constants of the payment ledger.

/// Votes a payee needs before its payment is enforced.
pub const SIGNATURES_REQUIRED: usize = 6;
/// Masternodes ranked high enough to vote for one block.
pub const SIGNATURES_TOTAL: u32 = 10;

/// Votes are accepted up to this many blocks above the tip.
pub const VOTE_FUTURE_WINDOW: u32 = 20;
/// Payees voted for in `tip..=tip + SCHEDULE_LOOKAHEAD` are not queued again.
pub const SCHEDULE_LOOKAHEAD: u32 = 8;
/// On a new tip an eligible masternode votes for `tip + VOTE_AHEAD`.
pub const VOTE_AHEAD: u32 = 5;

/// Average votes per block a healthy ledger holds.
pub const AVERAGE_VOTES: usize = (SIGNATURES_TOTAL as usize + SIGNATURES_REQUIRED) / 2;
