use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature does not verify against {0}")]
    BadSignature(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
}
