use lmnode_registry::Rejection;
use lmnode_types::{Amount, Outpoint};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    #[error("snapshot decoding failed: {0}")]
    Decode(String),

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("coinbase pays too much at height {height} (actual={actual} vs limit={limit})")]
    BlockValueTooHigh {
        height: u32,
        actual: Amount,
        limit: Amount,
    },
}

/// Why a payment vote or payment sync request was not accepted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PaymentRejectReason {
    #[error("peer protocol {0} is below the payment minimum")]
    PeerProtocol(u32),

    #[error("vote for height {height} is outside {first}..={last}")]
    OutOfRange { height: u32, first: u32, last: u32 },

    #[error("unknown masternode {0}")]
    UnknownVoter(Outpoint),

    #[error("masternode protocol is too old: {have}, required {need}")]
    VoterProtocol { have: u32, need: u32 },

    #[error("cannot calculate rank for {0}")]
    Unrankable(Outpoint),

    #[error("masternode is not in the top {top} ({rank})")]
    NotInTop { rank: u32, top: u32 },

    #[error("masternode {voter} already voted for height {height}")]
    AlreadyVoted { voter: Outpoint, height: u32 },

    #[error("bad payment vote signature")]
    BadSignature,

    #[error("peer already asked for the payment votes")]
    AlreadyRequested,
}

pub type PaymentRejection = Rejection<PaymentRejectReason>;
