//! Top-level wire message envelope.
//!
//! Every masternode message exchanged between nodes is wrapped in
//! [`WireMessage`]. Framing and transport belong to the host's P2P layer;
//! this crate only guarantees a lossless bincode encoding.

use crate::broadcast::Broadcast;
use crate::error::MessageError;
use crate::inventory::Inventory;
use crate::ping::Ping;
use crate::sync::SyncStatusCount;
use crate::verification::Verification;
use crate::vote::PaymentVote;
use lmnode_types::Outpoint;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Masternode broadcast.
    Announce(Broadcast),
    /// Masternode ping.
    Ping(Ping),
    /// Payment vote for a future block.
    PaymentVote(PaymentVote),
    /// Ask a peer for its payment votes. Carries our storage limit.
    PaymentSync { count_needed: u32 },
    /// Ask for the whole list (`Outpoint::NULL`) or a single entry.
    ListRequest(Outpoint),
    /// Number of items announced in answer to a list or payment sync request.
    SyncStatusCount(SyncStatusCount),
    /// Proof-of-service message in any phase.
    Verify(Verification),
    /// Announce objects by hash.
    Inventory(Vec<Inventory>),
    /// Request objects by hash.
    GetData(Vec<Inventory>),
    /// Ask a peer for its active sporks.
    GetSporks,
}

impl WireMessage {
    /// Short command name, used in logs and fulfilled-request tags.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Announce(_) => "mnb",
            Self::Ping(_) => "mnp",
            Self::PaymentVote(_) => "mnw",
            Self::PaymentSync { .. } => "mnget",
            Self::ListRequest(_) => "dseg",
            Self::SyncStatusCount(_) => "ssc",
            Self::Verify(_) => "mnv",
            Self::Inventory(_) => "inv",
            Self::GetData(_) => "getdata",
            Self::GetSporks => "getsporks",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|e| MessageError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ObjectHash;
    use crate::sync::SyncItem;
    use lmnode_crypto::{keypair_from_seed, payee_script};
    use lmnode_types::{BlockHash, Timestamp, TxHash};

    fn outpoint(b: u8) -> Outpoint {
        Outpoint::new(TxHash::new([b; 32]), u32::from(b))
    }

    fn sample_broadcast() -> Broadcast {
        let collateral = keypair_from_seed(&[1; 32]);
        let service = keypair_from_seed(&[2; 32]);
        let mut mnb = Broadcast::new(
            outpoint(1),
            "203.0.113.10:28878".parse().unwrap(),
            collateral.public.clone(),
            service.public,
            90024,
            Timestamp::new(1_700_000_000),
        );
        let mut ping = Ping::new(outpoint(1), BlockHash::new([4; 32]), Timestamp::new(1_700_000_100));
        ping.sign(&service.private);
        mnb.last_ping = Some(ping);
        mnb.sign(&collateral.private);
        mnb
    }

    fn roundtrip(msg: &WireMessage) -> WireMessage {
        let bytes = msg.encode().expect("encode");
        WireMessage::decode(&bytes).expect("decode")
    }

    #[test]
    fn announce_roundtrip() {
        let msg = WireMessage::Announce(sample_broadcast());
        let back = roundtrip(&msg);
        assert_eq!(back, msg);
        match back {
            WireMessage::Announce(mnb) => assert!(mnb.verify()),
            other => panic!("expected Announce, got {other:?}"),
        }
    }

    #[test]
    fn vote_roundtrip() {
        let mut vote = PaymentVote::new(
            outpoint(3),
            1234,
            payee_script(&keypair_from_seed(&[8; 32]).public),
        );
        vote.sign(&keypair_from_seed(&[9; 32]).private);
        let msg = WireMessage::PaymentVote(vote);
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn list_request_and_status_roundtrip() {
        for msg in [
            WireMessage::ListRequest(Outpoint::NULL),
            WireMessage::ListRequest(outpoint(5)),
            WireMessage::SyncStatusCount(SyncStatusCount {
                item: SyncItem::Winners,
                count: 17,
            }),
            WireMessage::PaymentSync { count_needed: 5000 },
            WireMessage::GetSporks,
        ] {
            assert_eq!(roundtrip(&msg), msg);
        }
    }

    #[test]
    fn verify_roundtrip() {
        let msg = WireMessage::Verify(Verification::request(
            "198.51.100.7:28878".parse().unwrap(),
            99,
            10,
        ));
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn inventory_roundtrip() {
        let msg = WireMessage::Inventory(vec![
            Inventory::Announce(ObjectHash([1; 32])),
            Inventory::PaymentBlock(BlockHash::new([2; 32])),
        ]);
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn commands_are_distinct() {
        let names = [
            WireMessage::GetSporks.command(),
            WireMessage::ListRequest(Outpoint::NULL).command(),
            WireMessage::PaymentSync { count_needed: 0 }.command(),
            WireMessage::Inventory(vec![]).command(),
            WireMessage::GetData(vec![]).command(),
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn corrupt_bytes_rejected_gracefully() {
        let garbage = vec![0xFF, 0xFE, 0xFD, 0xFC, 0x01, 0x02];
        assert!(WireMessage::decode(&garbage).is_err());
    }

    #[test]
    fn truncated_message_rejected() {
        let bytes = WireMessage::Announce(sample_broadcast()).encode().unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(WireMessage::decode(truncated).is_err());
    }

    #[test]
    fn empty_bytes_rejected() {
        assert!(WireMessage::decode(&[]).is_err());
    }
}
