use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("registry error: {0}")]
    Registry(#[from] lmnode_registry::RegistryError),

    #[error("payment error: {0}")]
    Payment(#[from] lmnode_payments::PaymentError),

    #[error("key error: {0}")]
    Crypto(#[from] lmnode_crypto::CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{path}:{line}: {reason}")]
    MasternodeConf {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("unknown masternode alias {0}")]
    UnknownAlias(String),

    #[error("no collateral key supplied for {0}")]
    MissingCollateralKey(String),

    #[error("masternode broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,
}
