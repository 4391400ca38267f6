//! Cryptographic primitives for the LMNode masternode layer.
//!
//! - **Ed25519** for collateral and service key signatures
//! - **Blake2b** for message identities, score hashing, and key ids
//! - Pay-to-key-id payee scripts derived from collateral keys

pub mod error;
pub mod hash;
pub mod keys;
pub mod payee;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{
    generate_keypair, keypair_from_private, keypair_from_seed, private_key_from_hex,
    public_from_private,
};
pub use payee::{key_id, payee_script};
pub use sign::{check_signature, sign_message, verify_signature};
