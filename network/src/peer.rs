//! Connected peers and the outbound message seam.

use crate::NetworkError;
use lmnode_messages::{Inventory, WireMessage};
use std::fmt;
use std::net::SocketAddr;

/// Host-assigned peer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer={}", self.0)
    }
}

/// What the engines need to know about a connected peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    pub addr: SocketAddr,
    /// Negotiated protocol version.
    pub version: u32,
    pub inbound: bool,
    /// Short-lived connection opened to talk to a masternode (verification, recovery).
    pub masternode_connection: bool,
    /// Last block height we have in common with the peer.
    pub common_height: Option<u32>,
    /// Height the peer reported at handshake.
    pub sync_height: Option<u32>,
}

impl PeerInfo {
    pub fn new(id: u64, addr: SocketAddr, version: u32) -> Self {
        Self {
            id: PeerId(id),
            addr,
            version,
            inbound: false,
            masternode_connection: false,
            common_height: None,
            sync_height: None,
        }
    }
}

/// Outbound side of the host's P2P layer.
///
/// All sends are fire-and-forget pushes onto per-peer queues.
pub trait PeerNetwork: Send + Sync {
    /// Snapshot of currently connected peers.
    fn peers(&self) -> Vec<PeerInfo>;

    fn peer(&self, id: PeerId) -> Option<PeerInfo> {
        self.peers().into_iter().find(|p| p.id == id)
    }

    /// Push a message to one peer.
    fn send(&self, peer: PeerId, message: WireMessage);

    /// Announce an object to every connected peer.
    fn relay(&self, inventory: Inventory);

    /// Report misbehaviour; the host decides when to ban.
    fn misbehaving(&self, peer: PeerId, score: u32);

    fn disconnect(&self, peer: PeerId);

    /// Open (or reuse) a masternode connection to `addr`.
    fn connect_masternode(&self, addr: SocketAddr) -> Result<PeerId, NetworkError>;
}
