//! Timing, quorum and storage constants of the masternode layer.

use lmnode_chain::{SporkId, SporkView};

// ── Record lifecycle ────────────────────────────────────────────────────

/// Minimum spacing between two non-forced `check()` runs of one record.
pub const CHECK_SECONDS: u64 = 5;
/// A record re-announced within this window only updates for its owner.
pub const MIN_MNB_SECONDS: u64 = 5 * 60;
/// Minimum spacing between pings.
pub const MIN_MNP_SECONDS: u64 = 10 * 60;
pub const EXPIRATION_SECONDS: u64 = 65 * 60;
pub const WATCHDOG_MAX_SECONDS: u64 = 120 * 60;
pub const NEW_START_REQUIRED_SECONDS: u64 = 180 * 60;
pub const POSE_BAN_MAX_SCORE: i32 = 5;

/// How far into the future a signature time may lie.
pub const MAX_FUTURE_SIG_SECONDS: u64 = 60 * 60;

// ── Pings ───────────────────────────────────────────────────────────────

/// A new ping anchors to the block this far below the tip.
pub const PING_ANCHOR_DEPTH: u32 = 12;
/// Pings anchored deeper than this below the tip are rejected.
pub const PING_MAX_ANCHOR_AGE: u32 = 24;

// ── Index ───────────────────────────────────────────────────────────────

pub const MAX_EXPECTED_INDEX_SIZE: usize = 30_000;
pub const MIN_INDEX_REBUILD_SECONDS: u64 = 3600;

// ── List sync ───────────────────────────────────────────────────────────

/// Cooldown between two full-list requests to or from the same peer.
pub const DSEG_UPDATE_SECONDS: u64 = 3 * 60 * 60;
/// Bounded last-paid scan depth once the first full scan is done.
pub const LAST_PAID_SCAN_BLOCKS: u32 = 100;

// ── Broadcast recovery ──────────────────────────────────────────────────

pub const MNB_RECOVERY_QUORUM_TOTAL: usize = 10;
pub const MNB_RECOVERY_QUORUM_REQUIRED: usize = 6;
pub const MNB_RECOVERY_MAX_ASK_ENTRIES: usize = 10;
pub const MNB_RECOVERY_WAIT_SECONDS: u64 = 60;
pub const MNB_RECOVERY_RETRY_SECONDS: u64 = 3 * 60 * 60;

// ── Selection ───────────────────────────────────────────────────────────

/// Scores for height `h` are seeded with the block hash at `h - 101`.
pub const SCORE_SEED_OFFSET: u32 = 101;
/// A freshly announced node waits this many seconds per registry entry before it can be paid.
pub const QUEUE_SECONDS_PER_NODE: u64 = 156;

// ── Payments ────────────────────────────────────────────────────────────

pub const MIN_PAYMENTS_PROTO_1: u32 = 90023;
pub const MIN_PAYMENTS_PROTO_2: u32 = 90024;
pub const STORAGE_COEFFICIENT: f64 = 1.25;
pub const MIN_BLOCKS_TO_STORE: u32 = 5000;

/// Minimum protocol a masternode must speak to be paid.
pub fn min_payments_proto(sporks: &dyn SporkView) -> u32 {
    if sporks.is_active(SporkId::PayUpdatedNodes) {
        MIN_PAYMENTS_PROTO_2
    } else {
        MIN_PAYMENTS_PROTO_1
    }
}

/// Number of blocks of payment votes kept: `max(size × 1.25, 5000)`.
pub fn storage_limit(registry_size: usize) -> u32 {
    let scaled = (registry_size as f64 * STORAGE_COEFFICIENT) as u32;
    scaled.max(MIN_BLOCKS_TO_STORE)
}
