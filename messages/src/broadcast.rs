//! Masternode announcement, signed by the collateral key.

use crate::inventory::ObjectHash;
use crate::ping::Ping;
use lmnode_crypto::{blake2b_256_multi, key_id, sign_message, verify_signature};
use lmnode_types::{Outpoint, PrivateKey, PublicKey, Signature, Timestamp};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// A masternode broadcast ("announce").
///
/// Carries the public identity of a masternode plus its most recent ping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub outpoint: Outpoint,
    /// Unlocking script of the collateral input. Must be empty on the wire.
    pub script_sig: Vec<u8>,
    pub addr: SocketAddr,
    pub collateral_key: PublicKey,
    pub service_key: PublicKey,
    pub signature: Signature,
    pub sig_time: Timestamp,
    pub protocol_version: u32,
    pub last_ping: Option<Ping>,
    /// Set locally when a recovery quorum re-submits a broadcast we have already seen.
    #[serde(skip)]
    pub recovery: bool,
}

impl Broadcast {
    pub fn new(
        outpoint: Outpoint,
        addr: SocketAddr,
        collateral_key: PublicKey,
        service_key: PublicKey,
        protocol_version: u32,
        sig_time: Timestamp,
    ) -> Self {
        Self {
            outpoint,
            script_sig: Vec::new(),
            addr,
            collateral_key,
            service_key,
            signature: Signature::default(),
            sig_time,
            protocol_version,
            last_ping: None,
            recovery: false,
        }
    }

    /// Identity used for dedup and inventory: `H(outpoint ‖ collateralKey ‖ sigTime)`.
    pub fn hash(&self) -> ObjectHash {
        ObjectHash(blake2b_256_multi(&[
            &self.outpoint.to_bytes(),
            self.collateral_key.as_bytes(),
            &self.sig_time.as_secs().to_le_bytes(),
        ]))
    }

    /// `addr ‖ sigTime ‖ collateralKeyId ‖ serviceKeyId ‖ protocolVersion`.
    pub fn signing_message(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}{}",
            self.addr,
            self.sig_time.as_secs(),
            key_id(&self.collateral_key),
            key_id(&self.service_key),
            self.protocol_version
        )
        .into_bytes()
    }

    pub fn sign(&mut self, collateral_private: &PrivateKey) {
        self.signature = sign_message(&self.signing_message(), collateral_private);
    }

    pub fn verify(&self) -> bool {
        verify_signature(&self.signing_message(), &self.signature, &self.collateral_key)
    }
}
