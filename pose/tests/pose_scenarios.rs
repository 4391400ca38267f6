//! Proof-of-service between a challenger, a challenged address and observers.

use lmnode_chain::{ChainView, Utxo};
use lmnode_crypto::{keypair_from_seed, payee_script};
use lmnode_messages::{Broadcast, Inventory, Verification, VerificationPhase, WireMessage};
use lmnode_network::{FulfilledRequests, PeerId, PeerInfo, PeerNetwork};
use lmnode_nullables::{NullChain, NullClock, NullNetwork, NullRandom, NullSporks, NullSyncStatus};
use lmnode_pose::constants::*;
use lmnode_pose::{PoseRejectReason, PoseVerifier};
use lmnode_registry::{Context, LocalIdentity, MasternodeRecord, Registry};
use lmnode_types::{
    ConsensusParams, KeyPair, MasternodeState, NetworkId, Outpoint, Timestamp, TxHash,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;

const T0: u64 = 1_600_000_000;
const SPACING: u64 = 60;
const BLOCKS: u32 = 300;
const NODES: u8 = 25;

struct Harness {
    params: ConsensusParams,
    chain: NullChain,
    network: NullNetwork,
    sporks: NullSporks,
    sync: NullSyncStatus,
    clock: NullClock,
    random: NullRandom,
    fulfilled: FulfilledRequests,
    local: Option<LocalIdentity>,
}

impl Harness {
    fn new() -> Self {
        Self {
            params: ConsensusParams::for_network(NetworkId::Regtest),
            chain: NullChain::with_blocks(BLOCKS, T0, SPACING),
            network: NullNetwork::new(),
            sporks: NullSporks::new(),
            sync: NullSyncStatus::synced(),
            clock: NullClock::new(T0 + u64::from(BLOCKS) * SPACING),
            random: NullRandom::constant(777),
            fulfilled: FulfilledRequests::default(),
            local: None,
        }
    }

    fn ctx(&self) -> Context<'_> {
        Context {
            params: &self.params,
            chain: &self.chain,
            network: &self.network,
            sporks: &self.sporks,
            sync: &self.sync,
            clock: &self.clock,
            random: &self.random,
            fulfilled: &self.fulfilled,
            local: self.local.clone(),
        }
    }

    fn tip(&self) -> u32 {
        self.chain.tip_height().unwrap()
    }

    fn act_as(&mut self, node: &Node) {
        self.local = Some(LocalIdentity {
            service_key: Arc::new(keypair_from_seed(&node.service_seed)),
            outpoint: Some(node.outpoint),
            addr: Some(node.addr),
        });
    }
}

struct Node {
    collateral: KeyPair,
    service: KeyPair,
    service_seed: [u8; 32],
    outpoint: Outpoint,
    addr: SocketAddr,
}

impl Node {
    fn new(n: u8) -> Self {
        let service_seed = [n.wrapping_add(100); 32];
        Self {
            collateral: keypair_from_seed(&[n; 32]),
            service: keypair_from_seed(&service_seed),
            service_seed,
            outpoint: Outpoint::new(TxHash::new([n; 32]), 0),
            addr: format!("1.2.3.{n}:18444").parse().unwrap(),
        }
    }

    /// Answer a challenge the way the node at `addr` would.
    fn reply(&self, request: &Verification, addr: SocketAddr) -> Verification {
        let mut mnv = request.clone();
        mnv.addr = addr;
        mnv.sign_reply(&NullChain::hash_for(mnv.height), &self.service.private);
        mnv
    }
}

/// `NODES` enabled masternodes; node 2 claims node 1's address.
fn populated(h: &Harness) -> (Registry, Vec<Node>) {
    let mut registry = Registry::new();
    let mut nodes: Vec<Node> = (1..=NODES).map(Node::new).collect();
    nodes[1].addr = nodes[0].addr;
    for node in &nodes {
        h.chain.add_utxo(
            node.outpoint,
            Utxo {
                value: h.params.collateral,
                script: payee_script(&node.collateral.public),
                height: 1,
            },
        );
        let mut mnb = Broadcast::new(
            node.outpoint,
            node.addr,
            node.collateral.public.clone(),
            node.service.public.clone(),
            PROTOCOL_VERSION,
            Timestamp::new(T0),
        );
        mnb.sign(&node.collateral.private);
        let mut record = MasternodeRecord::from_broadcast(&mnb, true);
        record.state = MasternodeState::Enabled;
        registry.add(record);
    }
    (registry, nodes)
}

/// Like [`populated`] but every node has its own address.
fn populated_distinct(h: &Harness) -> (Registry, Vec<Node>) {
    let (mut registry, mut nodes) = populated(h);
    let addr: SocketAddr = "1.2.3.200:18444".parse().unwrap();
    nodes[1].addr = addr;
    registry.with_record_mut(&nodes[1].outpoint, |r| r.addr = addr);
    (registry, nodes)
}

fn score(registry: &Registry, node: &Node) -> i32 {
    registry.find(&node.outpoint).unwrap().pose_ban_score
}

/// Nodes ordered by rank at `height` for proof-of-service.
fn by_rank<'a>(h: &Harness, registry: &Registry, nodes: &'a [Node], height: u32) -> Vec<&'a Node> {
    registry
        .get_ranks(height, MIN_POSE_PROTO_VERSION, &h.ctx())
        .into_iter()
        .map(|(_, info)| nodes.iter().find(|n| n.outpoint == info.outpoint).unwrap())
        .collect()
}

/// The highest ranked node that is neither of the two sharing an address.
fn challenger<'a>(h: &Harness, registry: &Registry, nodes: &'a [Node]) -> &'a Node {
    by_rank(h, registry, nodes, h.tip() - 1)
        .into_iter()
        .find(|n| n.outpoint != nodes[0].outpoint && n.outpoint != nodes[1].outpoint)
        .unwrap()
}

fn sent_request(h: &Harness, peer: PeerId) -> Verification {
    h.network
        .sent_to(peer)
        .into_iter()
        .find_map(|m| match m {
            WireMessage::Verify(mnv) => Some(mnv),
            _ => None,
        })
        .expect("a verify request")
}

/// Challenge the shared address and have node 1 answer. Returns the
/// challenger's verifier holding the countersigned broadcast.
fn challenge_shared_address(h: &mut Harness, registry: &mut Registry, nodes: &[Node]) -> (PoseVerifier, Verification) {
    let me = challenger(h, registry, nodes);
    h.act_as(me);
    let shared = nodes[0].addr;

    let mut verifier = PoseVerifier::new();
    verifier.send_verify_request(shared, &h.ctx()).unwrap();
    let peer_id = h.network.peers().iter().find(|p| p.addr == shared).unwrap().id;
    let request = sent_request(h, peer_id);
    assert_eq!(request.phase(), VerificationPhase::Request);
    assert_eq!(request.height, h.tip() - 1);

    let peer = PeerInfo::new(peer_id.0, shared, PROTOCOL_VERSION);
    let reply = nodes[0].reply(&request, shared);
    verifier
        .process_verify_reply(&peer, reply, registry, &h.ctx())
        .unwrap();

    let hash = match h.network.relayed().last() {
        Some(Inventory::Verify(hash)) => *hash,
        other => panic!("expected a relayed verification, got {other:?}"),
    };
    let broadcast = verifier.get_verification(&hash).unwrap();
    (verifier, broadcast)
}

#[test]
fn answered_challenge_scores_the_impostor() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);

    let (_, broadcast) = challenge_shared_address(&mut h, &mut registry, &nodes);

    assert_eq!(score(&registry, &nodes[0]), -1);
    assert_eq!(score(&registry, &nodes[1]), 1);
    assert_eq!(score(&registry, &nodes[2]), 0);
    assert_eq!(broadcast.phase(), VerificationPhase::Broadcast);
    assert_eq!(broadcast.vin1, nodes[0].outpoint);
    assert_eq!(broadcast.addr, nodes[0].addr);
}

#[test]
fn second_reply_for_a_verified_address_scores_20() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let (mut verifier, broadcast) = challenge_shared_address(&mut h, &mut registry, &nodes);

    let peer = PeerInfo::new(1000, nodes[0].addr, PROTOCOL_VERSION);
    let again = nodes[0].reply(&Verification::request(nodes[0].addr, broadcast.nonce, broadcast.height), nodes[0].addr);
    let err = verifier
        .process_verify_reply(&peer, again, &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 20);
    assert_eq!(err.reason, PoseRejectReason::AlreadyVerified(nodes[0].addr));
    assert_eq!(score(&registry, &nodes[0]), -1);
}

#[test]
fn wrong_nonce_scores_20() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    h.act_as(&nodes[5]);
    let shared = nodes[0].addr;

    let mut verifier = PoseVerifier::new();
    verifier.send_verify_request(shared, &h.ctx()).unwrap();
    let peer_id = h.network.peers().iter().find(|p| p.addr == shared).unwrap().id;
    let mut request = sent_request(&h, peer_id);
    request.nonce += 1;

    let peer = PeerInfo::new(peer_id.0, shared, PROTOCOL_VERSION);
    let err = verifier
        .process_verify_reply(&peer, nodes[0].reply(&request, shared), &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 20);
    assert!(matches!(err.reason, PoseRejectReason::WrongNonce { .. }));
    assert_eq!(score(&registry, &nodes[0]), 0);
}

#[test]
fn reply_signed_by_nobody_at_the_address_scores_20() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    h.act_as(&nodes[5]);
    let shared = nodes[0].addr;

    let mut verifier = PoseVerifier::new();
    verifier.send_verify_request(shared, &h.ctx()).unwrap();
    let peer_id = h.network.peers().iter().find(|p| p.addr == shared).unwrap().id;
    let request = sent_request(&h, peer_id);

    let peer = PeerInfo::new(peer_id.0, shared, PROTOCOL_VERSION);
    let forged = nodes[7].reply(&request, shared);
    let err = verifier
        .process_verify_reply(&peer, forged, &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 20);
    assert_eq!(err.reason, PoseRejectReason::NoRealMasternode(shared));
    assert_eq!(score(&registry, &nodes[1]), 0);
}

#[test]
fn challenged_masternode_signs_with_its_service_address() {
    let mut h = Harness::new();
    let (_, nodes) = populated(&h);
    h.act_as(&nodes[0]);

    let verifier = PoseVerifier::new();
    let peer = PeerInfo::new(7, "9.9.9.9:18444".parse().unwrap(), PROTOCOL_VERSION);
    let request = Verification::request("10.0.0.1:18444".parse().unwrap(), 55, h.tip() - 1);
    verifier.send_verify_reply(&peer, request.clone(), &h.ctx()).unwrap();

    let sent = h.network.sent_to(PeerId(7));
    let WireMessage::Verify(reply) = &sent[0] else {
        panic!("expected a verify reply");
    };
    assert_eq!(reply.phase(), VerificationPhase::Reply);
    assert_eq!(reply.addr, nodes[0].addr);
    assert!(reply.verify_reply(&NullChain::hash_for(request.height), &nodes[0].service.public));

    let err = verifier.send_verify_reply(&peer, request, &h.ctx()).unwrap_err();
    assert_eq!(err.dos, 20);
    assert_eq!(err.reason, PoseRejectReason::ReplyAlreadySent);
}

#[test]
fn challenge_for_unknown_block_is_dropped() {
    let mut h = Harness::new();
    let (_, nodes) = populated(&h);
    h.act_as(&nodes[0]);

    let verifier = PoseVerifier::new();
    let peer = PeerInfo::new(7, "9.9.9.9:18444".parse().unwrap(), PROTOCOL_VERSION);
    let request = Verification::request(nodes[0].addr, 55, h.tip() + 5);
    let err = verifier.send_verify_reply(&peer, request, &h.ctx()).unwrap_err();
    assert_eq!(err.dos, 0);
    assert!(h.network.sent().is_empty());
}

#[test]
fn observers_apply_a_relayed_verification() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let (_, broadcast) = challenge_shared_address(&mut h, &mut registry, &nodes);

    // A fresh node with its own view of the same list.
    h.local = None;
    let (mut observed, _) = populated(&h);
    let mut observer = PoseVerifier::new();
    let relayer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);

    observer
        .process_verify_broadcast(&relayer, broadcast.clone(), &mut observed, &h.ctx())
        .unwrap();
    assert_eq!(score(&observed, &nodes[0]), -1);
    assert_eq!(score(&observed, &nodes[1]), 1);
    assert!(observer.has_seen(&broadcast.hash()));

    // Seen once, applied once.
    observer
        .process_verify_broadcast(&relayer, broadcast, &mut observed, &h.ctx())
        .unwrap();
    assert_eq!(score(&observed, &nodes[0]), -1);
    assert_eq!(score(&observed, &nodes[1]), 1);
}

#[test]
fn challenger_claiming_the_proved_address_is_scored_too() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let (_, broadcast) = challenge_shared_address(&mut h, &mut registry, &nodes);
    h.local = None;

    let (mut observed, _) = populated(&h);
    observed.with_record_mut(&broadcast.vin2, |r| r.addr = broadcast.addr);
    let relayer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);
    PoseVerifier::new()
        .process_verify_broadcast(&relayer, broadcast.clone(), &mut observed, &h.ctx())
        .unwrap();

    assert_eq!(score(&observed, &nodes[0]), -1);
    assert_eq!(score(&observed, &nodes[1]), 1);
    assert_eq!(observed.find(&broadcast.vin2).unwrap().pose_ban_score, 1);
}

#[test]
fn self_verification_scores_100() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut mnv = Verification::request(nodes[0].addr, 1, h.tip() - 1);
    mnv.vin1 = nodes[0].outpoint;
    mnv.vin2 = nodes[0].outpoint;
    let block = NullChain::hash_for(mnv.height);
    mnv.sign_reply(&block, &nodes[0].service.private);
    mnv.sign_broadcast(&block, &nodes[0].service.private);

    let peer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);
    let err = PoseVerifier::new()
        .process_verify_broadcast(&peer, mnv, &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 100);
    assert_eq!(err.reason, PoseRejectReason::SelfVerification(nodes[0].outpoint));
}

#[test]
fn forged_countersignature_scores_20() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let (_, mut broadcast) = challenge_shared_address(&mut h, &mut registry, &nodes);
    h.local = None;

    // Signed by the proved node instead of the challenger.
    broadcast.sign_broadcast(&NullChain::hash_for(broadcast.height), &nodes[0].service.private);
    let (mut observed, _) = populated(&h);
    let peer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);
    let err = PoseVerifier::new()
        .process_verify_broadcast(&peer, broadcast.clone(), &mut observed, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 20);
    assert_eq!(err.reason, PoseRejectReason::BadSignature(broadcast.vin2));
    assert_eq!(score(&observed, &nodes[1]), 0);
}

#[test]
fn outdated_verification_is_ignored() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut mnv = Verification::request(nodes[0].addr, 1, h.tip() - MAX_POSE_BLOCKS - 1);
    mnv.vin1 = nodes[0].outpoint;
    mnv.vin2 = nodes[2].outpoint;
    let block = NullChain::hash_for(mnv.height);
    mnv.sign_reply(&block, &nodes[0].service.private);
    mnv.sign_broadcast(&block, &nodes[2].service.private);

    let peer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);
    let err = PoseVerifier::new()
        .process_verify_broadcast(&peer, mnv, &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(err.dos, 0);
    assert!(matches!(err.reason, PoseRejectReason::Outdated { .. }));
    assert_eq!(score(&registry, &nodes[1]), 0);
}

#[test]
fn low_ranked_verifier_is_not_trusted() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let height = h.tip() - 1;
    let ranked = by_rank(&h, &registry, &nodes, height);
    let low = ranked
        .iter()
        .skip(MAX_POSE_RANK as usize)
        .find(|n| n.outpoint != nodes[0].outpoint)
        .unwrap();

    let mut mnv = Verification::request(nodes[0].addr, 1, height);
    mnv.vin1 = nodes[0].outpoint;
    mnv.vin2 = low.outpoint;
    let block = NullChain::hash_for(height);
    mnv.sign_reply(&block, &nodes[0].service.private);
    mnv.sign_broadcast(&block, &low.service.private);

    let peer = PeerInfo::new(3, "8.8.8.8:18444".parse().unwrap(), PROTOCOL_VERSION);
    let err = PoseVerifier::new()
        .process_verify_broadcast(&peer, mnv, &mut registry, &h.ctx())
        .unwrap_err();
    assert!(matches!(err.reason, PoseRejectReason::NotInTop { .. }));
    assert_eq!(score(&registry, &nodes[1]), 0);
}

#[test]
fn top_node_challenges_its_stride() {
    let mut h = Harness::new();
    let (registry, nodes) = populated_distinct(&h);
    let ranked = by_rank(&h, &registry, &nodes, h.tip() - 1);
    h.act_as(ranked[0]);

    let mut verifier = PoseVerifier::new();
    let sent = verifier.do_full_verification_step(&registry, &h.ctx());

    // Rank 1 starts at rank 11 and steps by 10: ranks 11 and 21 of 25.
    assert_eq!(sent, 2);
    assert_eq!(
        h.network.connections(),
        vec![ranked[10].addr, ranked[20].addr]
    );
}

#[test]
fn verified_nodes_are_not_challenged_again() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated_distinct(&h);
    let ranked = by_rank(&h, &registry, &nodes, h.tip() - 1);
    registry.with_record_mut(&ranked[10].outpoint, |r| r.pose_ban_score = -5);
    h.act_as(ranked[0]);

    let sent = PoseVerifier::new().do_full_verification_step(&registry, &h.ctx());
    assert_eq!(sent, 1);
    assert_eq!(h.network.connections(), vec![ranked[20].addr]);
}

#[test]
fn nodes_outside_the_top_do_not_challenge() {
    let mut h = Harness::new();
    let (registry, nodes) = populated_distinct(&h);
    let ranked = by_rank(&h, &registry, &nodes, h.tip() - 1);
    h.act_as(ranked[MAX_POSE_RANK as usize]);

    assert_eq!(PoseVerifier::new().do_full_verification_step(&registry, &h.ctx()), 0);
    assert!(h.network.connections().is_empty());
}

#[test]
fn shared_address_with_a_verified_node_scores_the_rest() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    // Node 3 joins the address shared by nodes 1 and 2.
    registry.with_record_mut(&nodes[2].outpoint, |r| r.addr = nodes[0].addr);
    registry.with_record_mut(&nodes[1].outpoint, |r| r.pose_ban_score = -5);

    let scored = PoseVerifier::new().check_same_addr(&mut registry, &h.ctx());
    assert_eq!(scored, 2);
    assert_eq!(score(&registry, &nodes[0]), 1);
    assert_eq!(score(&registry, &nodes[1]), -5);
    assert_eq!(score(&registry, &nodes[2]), 1);
    assert_eq!(score(&registry, &nodes[3]), 0);
}

#[test]
fn only_one_verified_node_keeps_a_shared_address() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    registry.with_record_mut(&nodes[2].outpoint, |r| r.addr = nodes[0].addr);
    registry.with_record_mut(&nodes[0].outpoint, |r| r.pose_ban_score = -5);
    registry.with_record_mut(&nodes[1].outpoint, |r| r.pose_ban_score = -5);

    let scored = PoseVerifier::new().check_same_addr(&mut registry, &h.ctx());
    assert_eq!(scored, 2);
    assert_eq!(score(&registry, &nodes[0]), -5);
    assert_eq!(score(&registry, &nodes[1]), -4);
    assert_eq!(score(&registry, &nodes[2]), 1);
    assert_eq!(score(&registry, &nodes[3]), 0);
}

#[test]
fn shared_address_without_a_verified_node_is_left_alone() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    assert_eq!(PoseVerifier::new().check_same_addr(&mut registry, &h.ctx()), 0);
    assert_eq!(score(&registry, &nodes[0]), 0);
    assert_eq!(score(&registry, &nodes[1]), 0);
}
