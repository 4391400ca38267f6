//! Payment votes: a ranked masternode's choice of payee for a future block.

use crate::inventory::ObjectHash;
use lmnode_crypto::{blake2b_256_multi, sign_message, verify_signature};
use lmnode_types::{Outpoint, PrivateKey, PublicKey, Script, Signature};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVote {
    pub voter: Outpoint,
    pub height: u32,
    pub payee: Script,
    pub signature: Signature,
}

impl PaymentVote {
    pub fn new(voter: Outpoint, height: u32, payee: Script) -> Self {
        Self {
            voter,
            height,
            payee,
            signature: Signature::default(),
        }
    }

    /// `H(payee ‖ height ‖ voter)`.
    pub fn hash(&self) -> ObjectHash {
        ObjectHash(blake2b_256_multi(&[
            self.payee.as_bytes(),
            &self.height.to_le_bytes(),
            &self.voter.to_bytes(),
        ]))
    }

    pub fn signing_message(&self) -> Vec<u8> {
        format!("{}{}{}", self.voter, self.height, self.payee).into_bytes()
    }

    pub fn sign(&mut self, service_key: &PrivateKey) {
        self.signature = sign_message(&self.signing_message(), service_key);
    }

    pub fn verify(&self, service_pubkey: &PublicKey) -> bool {
        verify_signature(&self.signing_message(), &self.signature, service_pubkey)
    }
}
