//! Liveness heartbeat signed by a masternode's service key.

use crate::inventory::ObjectHash;
use lmnode_crypto::{blake2b_256_multi, sign_message, verify_signature};
use lmnode_types::{BlockHash, Outpoint, PrivateKey, PublicKey, Signature, Timestamp};
use serde::{Deserialize, Serialize};

/// A masternode ping.
///
/// `block_hash` anchors the ping to a recent block (12 below the tip when
/// created) so that stale pings cannot be replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub outpoint: Outpoint,
    pub block_hash: BlockHash,
    pub sig_time: Timestamp,
    pub signature: Signature,
}

impl Ping {
    pub fn new(outpoint: Outpoint, block_hash: BlockHash, sig_time: Timestamp) -> Self {
        Self {
            outpoint,
            block_hash,
            sig_time,
            signature: Signature::default(),
        }
    }

    /// Identity used for dedup and inventory: `H(outpoint ‖ sigTime)`.
    pub fn hash(&self) -> ObjectHash {
        ObjectHash(blake2b_256_multi(&[
            &self.outpoint.to_bytes(),
            &self.sig_time.as_secs().to_le_bytes(),
        ]))
    }

    /// The bytes the service key signs: `outpoint ‖ blockHash ‖ sigTime`.
    pub fn signing_message(&self) -> Vec<u8> {
        format!(
            "{}{}{}",
            self.outpoint,
            self.block_hash,
            self.sig_time.as_secs()
        )
        .into_bytes()
    }

    pub fn sign(&mut self, service_key: &PrivateKey) {
        self.signature = sign_message(&self.signing_message(), service_key);
    }

    pub fn verify(&self, service_pubkey: &PublicKey) -> bool {
        verify_signature(&self.signing_message(), &self.signature, service_pubkey)
    }

    /// Whether at least `seconds` have passed since the ping was signed.
    pub fn is_expired(&self, seconds: u64, now: Timestamp) -> bool {
        self.sig_time.has_expired(seconds, now)
    }
}
