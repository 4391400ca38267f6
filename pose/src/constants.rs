/// Oldest protocol version that takes part in proof-of-service.
pub const MIN_POSE_PROTO_VERSION: u32 = 70203;

/// Challenges sent per verification step.
pub const MAX_POSE_CONNECTIONS: usize = 10;

/// Only the top ranked masternodes challenge others.
pub const MAX_POSE_RANK: u32 = 10;

/// Verifications older than this many blocks are ignored and expired.
pub const MAX_POSE_BLOCKS: u32 = 10;

/// Upper bound (exclusive) of challenge nonces.
pub const NONCE_RANGE: u32 = 999_999;
