//! Ed25519 key generation and parsing.

use crate::error::CryptoError;
use ed25519_dalek::SigningKey;
use lmnode_types::{KeyPair, PrivateKey, PublicKey};
use rand::rngs::OsRng;

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    KeyPair {
        public: PublicKey(verifying_key.to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_private(PrivateKey(*seed))
}

/// Parse a 64-character hex private key, as written in `lmnode.conf` and the node config.
pub fn private_key_from_hex(s: &str) -> Result<PrivateKey, CryptoError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| CryptoError::InvalidPrivateKey(format!("expected 32 bytes, got {}", v.len())))?;
    Ok(PrivateKey(arr))
}
