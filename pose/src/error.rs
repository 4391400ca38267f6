use lmnode_network::NetworkError;
use lmnode_registry::Rejection;
use lmnode_types::Outpoint;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("already challenged {0} recently")]
    AlreadyRequested(SocketAddr),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: NetworkError,
    },

    #[error("no chain tip")]
    NoTip,
}

/// Why a verification message was not accepted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoseRejectReason {
    #[error("peer already asked us for a reply recently")]
    ReplyAlreadySent,

    #[error("we did not challenge {0}")]
    NotRequested(SocketAddr),

    #[error("wrong nonce: requested {requested}, received {received}")]
    WrongNonce { requested: u32, received: u32 },

    #[error("wrong height: requested {requested}, received {received}")]
    WrongHeight { requested: u32, received: u32 },

    #[error("{0} was already verified recently")]
    AlreadyVerified(SocketAddr),

    #[error("no masternode at {0} signed the reply")]
    NoRealMasternode(SocketAddr),

    #[error("unknown block at height {0}")]
    UnknownBlock(u32),

    #[error("verification at height {height} is older than {oldest}")]
    Outdated { height: u32, oldest: u32 },

    #[error("masternode {0} verified itself")]
    SelfVerification(Outpoint),

    #[error("cannot rank masternode {0}")]
    Unrankable(Outpoint),

    #[error("verifier has rank {rank}, top {top} required")]
    NotInTop { rank: u32, top: u32 },

    #[error("unknown masternode {0}")]
    UnknownMasternode(Outpoint),

    #[error("address {claimed} does not match the masternode's {actual}")]
    AddressMismatch {
        claimed: SocketAddr,
        actual: SocketAddr,
    },

    #[error("bad signature from masternode {0}")]
    BadSignature(Outpoint),
}

pub type PoseRejection = Rejection<PoseRejectReason>;
