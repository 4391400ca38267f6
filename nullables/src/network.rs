//! Nullable network: record messages without sending them.

use lmnode_messages::{Inventory, WireMessage};
use lmnode_network::{NetworkError, PeerId, PeerInfo, PeerNetwork};
use std::net::SocketAddr;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    peers: Vec<PeerInfo>,
    sent: Vec<(PeerId, WireMessage)>,
    relayed: Vec<Inventory>,
    misbehaviour: Vec<(PeerId, u32)>,
    disconnected: Vec<PeerId>,
    connections: Vec<SocketAddr>,
    refuse_connections: bool,
    next_id: u64,
}

/// A test network that records every outbound effect instead of performing it.
#[derive(Default)]
pub struct NullNetwork {
    state: Mutex<State>,
}

impl NullNetwork {
    pub fn new() -> Self {
        let net = Self::default();
        net.state.lock().unwrap().next_id = 1000;
        net
    }

    pub fn add_peer(&self, peer: PeerInfo) {
        self.state.lock().unwrap().peers.push(peer);
    }

    pub fn remove_peer(&self, id: PeerId) {
        self.state.lock().unwrap().peers.retain(|p| p.id != id);
    }

    /// Make `connect_masternode` fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connections = refuse;
    }

    /// All messages "sent" (for assertions).
    pub fn sent(&self) -> Vec<(PeerId, WireMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_to(&self, peer: PeerId) -> Vec<WireMessage> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(p, _)| *p == peer)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn relayed(&self) -> Vec<Inventory> {
        self.state.lock().unwrap().relayed.clone()
    }

    /// Total misbehaviour score reported against `peer`.
    pub fn misbehaviour_of(&self, peer: PeerId) -> u32 {
        self.state
            .lock()
            .unwrap()
            .misbehaviour
            .iter()
            .filter(|(p, _)| *p == peer)
            .map(|(_, s)| s)
            .sum()
    }

    pub fn disconnected(&self) -> Vec<PeerId> {
        self.state.lock().unwrap().disconnected.clone()
    }

    /// Addresses passed to `connect_masternode`.
    pub fn connections(&self) -> Vec<SocketAddr> {
        self.state.lock().unwrap().connections.clone()
    }

    /// Clear recorded effects; peers stay connected.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.sent.clear();
        state.relayed.clear();
        state.misbehaviour.clear();
        state.disconnected.clear();
        state.connections.clear();
    }
}

impl PeerNetwork for NullNetwork {
    fn peers(&self) -> Vec<PeerInfo> {
        self.state.lock().unwrap().peers.clone()
    }

    fn send(&self, peer: PeerId, message: WireMessage) {
        self.state.lock().unwrap().sent.push((peer, message));
    }

    fn relay(&self, inventory: Inventory) {
        self.state.lock().unwrap().relayed.push(inventory);
    }

    fn misbehaving(&self, peer: PeerId, score: u32) {
        self.state.lock().unwrap().misbehaviour.push((peer, score));
    }

    fn disconnect(&self, peer: PeerId) {
        self.state.lock().unwrap().disconnected.push(peer);
    }

    fn connect_masternode(&self, addr: SocketAddr) -> Result<PeerId, NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.connections.push(addr);
        if state.refuse_connections {
            return Err(NetworkError::ConnectionFailed(addr.to_string()));
        }
        if let Some(existing) = state.peers.iter().find(|p| p.addr == addr) {
            return Ok(existing.id);
        }
        let id = PeerId(state.next_id);
        state.next_id += 1;
        let mut peer = PeerInfo::new(id.0, addr, lmnode_types::PROTOCOL_VERSION);
        peer.masternode_connection = true;
        state.peers.push(peer);
        Ok(id)
    }
}
