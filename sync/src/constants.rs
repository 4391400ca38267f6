/// Seconds between two sync steps.
pub const SYNC_TICK_SECONDS: u64 = 6;

/// An asset times out after this long without new data.
pub const SYNC_TIMEOUT_SECONDS: u64 = 30;

/// Peers at our height needed to call the chain synced.
pub const SYNC_ENOUGH_PEERS: usize = 3;

/// Wait this long after a failure before starting over.
pub const FAILURE_COOLDOWN_SECONDS: u64 = 60;

/// A gap this long between checks means the host slept; sync restarts.
pub const SLEEP_RESET_SECONDS: u64 = 60 * 60;

/// Best header may be at most this far ahead of the tip (one day of blocks).
pub const MAX_HEADERS_AHEAD: u32 = 24 * 6;

/// Attempts per asset used to scale the progress report.
pub const ATTEMPTS_PER_ASSET: u32 = 8;
