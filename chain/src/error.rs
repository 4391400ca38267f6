use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block not found at height {0}")]
    BlockNotFound(u32),

    #[error("failed to read block {height}: {reason}")]
    ReadFailed { height: u32, reason: String },

    #[error("utxo lookup failed: {0}")]
    Utxo(String),
}
