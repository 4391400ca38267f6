//! Proof-of-service challenge, reply and broadcast.
//!
//! One message type carries all three phases; which one it is follows from
//! which signatures are present.

use crate::inventory::ObjectHash;
use lmnode_crypto::{blake2b_256_multi, sign_message, verify_signature};
use lmnode_types::{BlockHash, Outpoint, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub addr: SocketAddr,
    pub nonce: u32,
    pub height: u32,
    /// Proved node, filled in by the challenger once the reply checks out.
    pub vin1: Outpoint,
    /// Challenger.
    pub vin2: Outpoint,
    /// By the challenged node over `addr ‖ nonce ‖ blockHash`.
    pub sig1: Signature,
    /// By the challenger over `addr ‖ nonce ‖ blockHash ‖ vin1 ‖ vin2`.
    pub sig2: Signature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationPhase {
    Request,
    Reply,
    Broadcast,
}

impl Verification {
    pub fn request(addr: SocketAddr, nonce: u32, height: u32) -> Self {
        Self {
            addr,
            nonce,
            height,
            vin1: Outpoint::default(),
            vin2: Outpoint::default(),
            sig1: Signature::default(),
            sig2: Signature::default(),
        }
    }

    pub fn phase(&self) -> VerificationPhase {
        if self.sig1.is_empty() {
            VerificationPhase::Request
        } else if self.sig2.is_empty() {
            VerificationPhase::Reply
        } else {
            VerificationPhase::Broadcast
        }
    }

    pub fn hash(&self) -> ObjectHash {
        ObjectHash(blake2b_256_multi(&[
            &self.vin1.to_bytes(),
            &self.vin2.to_bytes(),
            self.addr.to_string().as_bytes(),
            &self.nonce.to_le_bytes(),
            &self.height.to_le_bytes(),
        ]))
    }

    pub fn reply_message(&self, block_hash: &BlockHash) -> Vec<u8> {
        format!("{}{}{}", self.addr, self.nonce, block_hash).into_bytes()
    }

    pub fn broadcast_message(&self, block_hash: &BlockHash) -> Vec<u8> {
        format!(
            "{}{}{}{}{}",
            self.addr, self.nonce, block_hash, self.vin1, self.vin2
        )
        .into_bytes()
    }

    pub fn sign_reply(&mut self, block_hash: &BlockHash, key: &PrivateKey) {
        self.sig1 = sign_message(&self.reply_message(block_hash), key);
    }

    pub fn sign_broadcast(&mut self, block_hash: &BlockHash, key: &PrivateKey) {
        self.sig2 = sign_message(&self.broadcast_message(block_hash), key);
    }

    pub fn verify_reply(&self, block_hash: &BlockHash, key: &PublicKey) -> bool {
        verify_signature(&self.reply_message(block_hash), &self.sig1, key)
    }

    pub fn verify_broadcast(&self, block_hash: &BlockHash, key: &PublicKey) -> bool {
        verify_signature(&self.broadcast_message(block_hash), &self.sig2, key)
    }
}
