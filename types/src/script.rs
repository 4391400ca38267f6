//! Payee scripts.
//!
//! The masternode layer only ever builds and recognises one script form:
//! pay-to-key-id (`DUP HASH160 <20 bytes> EQUALVERIFY CHECKSIG`, 25 bytes).

use crate::keys::KeyId;
use serde::{Deserialize, Serialize};
use std::fmt;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

/// Length of a pay-to-key-id script.
pub const PAY_TO_KEY_ID_LEN: usize = 25;

/// An output locking script.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn pay_to_key_id(id: &KeyId) -> Self {
        let mut bytes = Vec::with_capacity(PAY_TO_KEY_ID_LEN);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
        bytes.extend_from_slice(id.as_bytes());
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_pay_to_key_id(&self) -> bool {
        self.0.len() == PAY_TO_KEY_ID_LEN
            && self.0[0] == OP_DUP
            && self.0[1] == OP_HASH160
            && self.0[2] == PUSH_20
            && self.0[23] == OP_EQUALVERIFY
            && self.0[24] == OP_CHECKSIG
    }

    /// The key id committed to by a pay-to-key-id script.
    pub fn key_id(&self) -> Option<KeyId> {
        if !self.is_pay_to_key_id() {
            return None;
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(&self.0[3..23]);
        Some(KeyId(id))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self)
    }
}

/// Pay-to-key-id scripts display as their key id, anything else as raw hex.
impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_id() {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "{}", crate::hash::hex::encode(&self.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pay_to_key_id_is_25_bytes() {
        let s = Script::pay_to_key_id(&KeyId([7; 20]));
        assert_eq!(s.len(), PAY_TO_KEY_ID_LEN);
        assert!(s.is_pay_to_key_id());
        assert_eq!(s.key_id(), Some(KeyId([7; 20])));
    }

    #[test]
    fn arbitrary_bytes_are_not_pay_to_key_id() {
        let s = Script::new(vec![0u8; 25]);
        assert!(!s.is_pay_to_key_id());
        assert_eq!(s.key_id(), None);
        assert_eq!(s.to_string(), "00".repeat(25));
    }
}
