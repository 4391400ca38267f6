//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the masternode layer.
#[derive(Debug, Error)]
pub enum LmnodeError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid service address: {0}")]
    InvalidAddress(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}
