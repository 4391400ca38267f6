//! Key ids and payee scripts.
//!
//! A key id is the first 20 bytes of the Blake2b-256 hash of a public key.
//! Masternodes are paid to the pay-to-key-id script of their collateral key.

use crate::hash::blake2b_256;
use lmnode_types::{KeyId, PublicKey, Script};

pub fn key_id(public: &PublicKey) -> KeyId {
    let digest = blake2b_256(public.as_bytes());
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[..20]);
    KeyId(id)
}

pub fn payee_script(public: &PublicKey) -> Script {
    Script::pay_to_key_id(&key_id(public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn payee_script_commits_to_key_id() {
        let kp = keypair_from_seed(&[5u8; 32]);
        let script = payee_script(&kp.public);
        assert_eq!(script.len(), 25);
        assert_eq!(script.key_id(), Some(key_id(&kp.public)));
    }

    #[test]
    fn distinct_keys_distinct_scripts() {
        let a = payee_script(&keypair_from_seed(&[1u8; 32]).public);
        let b = payee_script(&keypair_from_seed(&[2u8; 32]).public);
        assert_ne!(a, b);
    }
}
