use lmnode_types::{Amount, BlockHash, Outpoint};
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    #[error("snapshot decoding failed: {0}")]
    Decode(String),

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

/// Why an announcement, ping or list request was not accepted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("invalid service address {0}")]
    InvalidAddress(SocketAddr),

    #[error("signature time too far in the future")]
    FutureSigTime,

    #[error("outdated protocol version {0}")]
    OutdatedProtocol(u32),

    #[error("key does not produce a pay-to-key-id script")]
    BadKeyScript,

    #[error("collateral input carries a non-empty script")]
    NonEmptyScriptSig,

    #[error("port {0} is not allowed on this network")]
    InvalidPort(u16),

    #[error("announcement has the same signature time as the stored one")]
    DuplicateSigTime,

    #[error("announcement is older than the stored one")]
    OlderThanStored,

    #[error("masternode is banned by proof-of-service")]
    PoseBanned,

    #[error("collateral key does not match the stored record")]
    CollateralKeyMismatch,

    #[error("bad signature")]
    BadSignature,

    #[error("announcement for our own collateral")]
    OwnCollateral,

    #[error("collateral output {0} not found")]
    CollateralNotFound(Outpoint),

    #[error("collateral holds {0}, expected the exact collateral amount")]
    WrongCollateralValue(Amount),

    #[error("collateral has {have} confirmations, {need} required")]
    NotEnoughConfirmations { have: u32, need: u32 },

    #[error("collateral output is not paid to the collateral key")]
    CollateralNotOwned,

    #[error("signature time precedes the collateral's confirmation block")]
    SigTimeBeforeConfirmation,

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("own announcement with protocol {0}, reactivation required")]
    OwnProtocolMismatch(u32),

    #[error("unknown anchor block {0}")]
    UnknownBlock(BlockHash),

    #[error("unknown masternode {0}")]
    UnknownMasternode(Outpoint),

    #[error("masternode protocol is outdated")]
    UpdateRequired,

    #[error("masternode needs a new announcement")]
    NewStartRequired,

    #[error("anchor block is too old")]
    AnchorTooOld,

    #[error("ping arrived too early")]
    TooEarly,

    #[error("masternode is not enabled")]
    NotEnabled,

    #[error("peer already asked for the full list")]
    ListAlreadyRequested,
}

impl RejectReason {
    /// Failures that may succeed later; the seen entry is dropped so the message can be rechecked.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotEnoughConfirmations { .. } | Self::ChainUnavailable(_)
        )
    }
}

/// A rejected message together with the misbehaviour score its sender earned.
///
/// `dos == 0` means the message is dropped without penalising the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection<R = RejectReason> {
    pub dos: u32,
    pub reason: R,
}

impl<R> Rejection<R> {
    pub fn new(dos: u32, reason: R) -> Self {
        Self { dos, reason }
    }

    /// Drop without a misbehaviour score.
    pub fn soft(reason: R) -> Self {
        Self { dos: 0, reason }
    }
}

impl<R: fmt::Display> fmt::Display for Rejection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dos > 0 {
            write!(f, "{} (dos {})", self.reason, self.dos)
        } else {
            write!(f, "{}", self.reason)
        }
    }
}

impl<R: fmt::Debug + fmt::Display> std::error::Error for Rejection<R> {}
