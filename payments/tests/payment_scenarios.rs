//! Payment ledger behaviour against a populated registry and nullable host.

use lmnode_chain::{ChainView, SporkId, TxOut, Utxo};
use lmnode_crypto::{keypair_from_seed, payee_script};
use lmnode_messages::{Broadcast, Inventory, PaymentVote, SyncItem, SyncStatusCount, WireMessage};
use lmnode_network::{FulfilledRequests, PeerInfo};
use lmnode_nullables::{NullChain, NullClock, NullNetwork, NullRandom, NullSporks, NullSyncStatus};
use lmnode_payments::constants::*;
use lmnode_payments::{PaymentLedger, PaymentRejectReason};
use lmnode_registry::{Context, LocalIdentity, MasternodeRecord, Registry};
use lmnode_types::{
    Amount, ConsensusParams, KeyPair, MasternodeState, NetworkId, Outpoint, Script, Timestamp,
    TxHash, PROTOCOL_VERSION,
};
use std::sync::Arc;

const T0: u64 = 1_600_000_000;
const SPACING: u64 = 60;
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
        Self::with_blocks(300)
    }

    fn with_blocks(blocks: u32) -> Self {
        Self {
            params: ConsensusParams::for_network(NetworkId::Regtest),
            chain: NullChain::with_blocks(blocks, T0, SPACING),
            network: NullNetwork::new(),
            sporks: NullSporks::new(),
            sync: NullSyncStatus::synced(),
            clock: NullClock::new(T0 + u64::from(blocks) * SPACING),
            random: NullRandom::constant(0),
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

    /// Run as the masternode `node`.
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
    addr: std::net::SocketAddr,
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

    fn payee(&self) -> Script {
        payee_script(&self.collateral.public)
    }

    fn vote(&self, height: u32, payee: &Script) -> PaymentVote {
        let mut vote = PaymentVote::new(self.outpoint, height, payee.clone());
        vote.sign(&self.service.private);
        vote
    }
}

/// A registry of `NODES` enabled masternodes with mature collateral.
fn populated(h: &Harness) -> (Registry, Vec<Node>) {
    let mut registry = Registry::new();
    let nodes: Vec<Node> = (1..=NODES).map(Node::new).collect();
    for node in &nodes {
        h.chain.add_utxo(
            node.outpoint,
            Utxo {
                value: h.params.collateral,
                script: node.payee(),
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

/// Nodes ordered by their rank for votes at `height`.
fn by_rank<'a>(registry: &Registry, nodes: &'a [Node], height: u32, h: &Harness) -> Vec<&'a Node> {
    let min_proto = h.ctx().min_payments_proto();
    registry
        .get_ranks(height - 101, min_proto, &h.ctx())
        .into_iter()
        .filter_map(|(_, info)| nodes.iter().find(|n| n.outpoint == info.outpoint))
        .collect()
}

fn peer() -> PeerInfo {
    PeerInfo::new(7, "5.6.7.8:18444".parse().unwrap(), PROTOCOL_VERSION)
}

fn coinbase(payee: &Script) -> Vec<TxOut> {
    vec![
        TxOut::new(Script::new(vec![0xee; 25]), Amount::from_coins(70)),
        TxOut::new(payee.clone(), Amount::from_coins(30)),
    ]
}

// ── Quorum ──────────────────────────────────────────────────────────────

#[test]
fn sixth_vote_makes_the_payee_mandatory() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 10;
    let winner = nodes[20].payee();
    let other = nodes[21].payee();

    for node in &nodes[..5] {
        assert_eq!(
            ledger.process_payment_vote(&peer(), node.vote(height, &winner), &mut registry, &h.ctx()),
            Ok(())
        );
    }
    assert_eq!(ledger.block_payees(height).unwrap().max_votes(), 5);
    assert!(ledger.is_transaction_valid(&coinbase(&other), height, &h.ctx()));
    assert!(ledger.is_transaction_valid(&coinbase(&winner), height, &h.ctx()));

    ledger
        .process_payment_vote(&peer(), nodes[5].vote(height, &winner), &mut registry, &h.ctx())
        .unwrap();
    assert!(ledger.is_transaction_valid(&coinbase(&winner), height, &h.ctx()));
    assert!(!ledger.is_transaction_valid(&coinbase(&other), height, &h.ctx()));

    let short = vec![
        TxOut::new(Script::new(vec![0xee; 25]), Amount::from_coins(71)),
        TxOut::new(winner.clone(), Amount::from_coins(29)),
    ];
    assert!(!ledger.is_transaction_valid(&short, height, &h.ctx()));
    assert_eq!(h.sync.payment_votes(), 6);
    assert_eq!(ledger.get_block_payee(height), Some(winner.clone()));
    assert_eq!(
        ledger.get_required_payments_string(height),
        format!("{winner}:6")
    );
    assert_eq!(ledger.get_required_payments_string(height + 1), "Unknown");
}

#[test]
fn enforcement_spork_decides_block_validity() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 10;
    let winner = nodes[20].payee();
    for node in &nodes[..6] {
        ledger
            .process_payment_vote(&peer(), node.vote(height, &winner), &mut registry, &h.ctx())
            .unwrap();
    }
    let wrong = coinbase(&nodes[21].payee());

    assert!(ledger.is_block_payee_valid(&wrong, height, &h.ctx()));
    h.sporks.set(SporkId::PaymentEnforcement, true);
    assert!(!ledger.is_block_payee_valid(&wrong, height, &h.ctx()));
    assert!(ledger.is_block_payee_valid(&coinbase(&winner), height, &h.ctx()));

    // Before payments start and while syncing anything goes.
    assert!(ledger.is_block_payee_valid(&wrong, h.params.payments_start_block - 1, &h.ctx()));
    h.sync.set_winners_synced(false);
    assert!(ledger.is_block_payee_valid(&wrong, height, &h.ctx()));
}

#[test]
fn same_vote_twice_changes_nothing() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 3;
    let vote = nodes[0].vote(height, &nodes[9].payee());

    ledger
        .process_payment_vote(&peer(), vote.clone(), &mut registry, &h.ctx())
        .unwrap();
    ledger
        .process_payment_vote(&peer(), vote, &mut registry, &h.ctx())
        .unwrap();
    assert_eq!(ledger.vote_count(), 1);
    assert_eq!(ledger.block_payees(height).unwrap().total_votes(), 1);
    assert_eq!(h.sync.payment_votes(), 1);
}

#[test]
fn second_vote_from_one_masternode_is_refused() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 3;

    ledger
        .process_payment_vote(&peer(), nodes[0].vote(height, &nodes[9].payee()), &mut registry, &h.ctx())
        .unwrap();
    let rejection = ledger
        .process_payment_vote(&peer(), nodes[0].vote(height, &nodes[10].payee()), &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(rejection.dos, 0);
    assert_eq!(
        rejection.reason,
        PaymentRejectReason::AlreadyVoted {
            voter: nodes[0].outpoint,
            height
        }
    );
    assert_eq!(ledger.block_payees(height).unwrap().total_votes(), 1);
}

// ── Vote window ─────────────────────────────────────────────────────────

#[test]
fn votes_outside_the_window_are_rejected() {
    let h = Harness::with_blocks(5400);
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let tip = h.tip();
    let limit = ledger.storage_limit(registry.size());
    assert_eq!(limit, 5000);
    let payee = nodes[3].payee();

    for height in [tip - limit - 1, tip + VOTE_FUTURE_WINDOW + 1] {
        let rejection = ledger
            .process_payment_vote(&peer(), nodes[0].vote(height, &payee), &mut registry, &h.ctx())
            .unwrap_err();
        assert!(matches!(rejection.reason, PaymentRejectReason::OutOfRange { .. }));
        assert_eq!(rejection.dos, 0);
    }
    assert_eq!(ledger.block_count(), 0);

    // The oldest height inside the window is still accepted.
    ledger
        .process_payment_vote(&peer(), nodes[0].vote(tip - limit, &payee), &mut registry, &h.ctx())
        .unwrap();
    assert_eq!(ledger.block_count(), 1);
}

#[test]
fn old_votes_are_pruned() {
    let h = Harness::with_blocks(5400);
    let (registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let tip = h.tip();
    let payee = nodes[3].payee();

    assert!(ledger.add_payment_vote(nodes[0].vote(150, &payee), &h.ctx()));
    assert!(ledger.add_payment_vote(nodes[0].vote(tip - 5, &payee), &h.ctx()));
    ledger.check_and_remove(registry.size(), &h.ctx());
    assert_eq!(ledger.vote_count(), 1);
    assert!(ledger.block_payees(150).is_none());
    assert!(ledger.block_payees(tip - 5).is_some());
}

#[test]
fn vote_without_seed_block_is_not_counted() {
    let h = Harness::new();
    let nodes: Vec<Node> = (1..=2).map(Node::new).collect();
    let mut ledger = PaymentLedger::new();
    assert!(!ledger.add_payment_vote(nodes[0].vote(100, &nodes[1].payee()), &h.ctx()));
    assert!(!ledger.add_payment_vote(nodes[0].vote(h.tip() + 102, &nodes[1].payee()), &h.ctx()));
    assert_eq!(ledger.block_count(), 0);
}

// ── Ranked votes ────────────────────────────────────────────────────────

#[test]
fn future_votes_need_a_top_rank() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() + 5;
    let ranked = by_rank(&registry, &nodes, height, &h);
    assert_eq!(ranked.len(), NODES as usize);
    let payee = nodes[0].payee();

    ledger
        .process_payment_vote(&peer(), ranked[0].vote(height, &payee), &mut registry, &h.ctx())
        .unwrap();
    assert_eq!(ledger.block_payees(height).unwrap().total_votes(), 1);
    assert!(h.network.relayed().contains(&Inventory::PaymentVote(ranked[0].vote(height, &payee).hash())));

    let rejection = ledger
        .process_payment_vote(&peer(), ranked[14].vote(height, &payee), &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(rejection.dos, 0);
    assert_eq!(rejection.reason, PaymentRejectReason::NotInTop { rank: 15, top: 10 });

    let rejection = ledger
        .process_payment_vote(&peer(), ranked[21].vote(height, &payee), &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(rejection.dos, 20);
    assert_eq!(rejection.reason, PaymentRejectReason::NotInTop { rank: 22, top: 20 });
}

#[test]
fn forged_future_vote_scores_20_and_asks_for_the_voter() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() + 5;
    let voter = by_rank(&registry, &nodes, height, &h)[0];

    let mut vote = PaymentVote::new(voter.outpoint, height, nodes[0].payee());
    vote.sign(&keypair_from_seed(&[250; 32]).private);
    let rejection = ledger
        .process_payment_vote(&peer(), vote, &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(rejection.dos, 20);
    assert_eq!(rejection.reason, PaymentRejectReason::BadSignature);
    assert!(h
        .network
        .sent_to(peer().id)
        .contains(&WireMessage::ListRequest(voter.outpoint)));
    assert_eq!(ledger.block_count(), 0);
}

#[test]
fn unknown_voter_is_asked_for() {
    let h = Harness::new();
    let (mut registry, _) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let stranger = Node::new(200);

    let rejection = ledger
        .process_payment_vote(&peer(), stranger.vote(h.tip(), &stranger.payee()), &mut registry, &h.ctx())
        .unwrap_err();
    assert_eq!(rejection.reason, PaymentRejectReason::UnknownVoter(stranger.outpoint));
    assert!(h
        .network
        .sent_to(peer().id)
        .contains(&WireMessage::ListRequest(stranger.outpoint)));
}

#[test]
fn votes_are_ignored_until_the_list_is_synced() {
    let h = Harness::new();
    h.sync.set_list_synced(false);
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let vote = nodes[0].vote(h.tip(), &nodes[1].payee());
    assert_eq!(ledger.process_payment_vote(&peer(), vote, &mut registry, &h.ctx()), Ok(()));
    assert_eq!(ledger.vote_count(), 0);
}

// ── Own votes and block assembly ────────────────────────────────────────

#[test]
fn top_ranked_masternode_votes_for_the_queue_winner() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let tip = h.tip();
    let height = tip + VOTE_AHEAD;
    let me = by_rank(&registry, &nodes, height, &h)[0];
    h.act_as(me);
    let mut ledger = PaymentLedger::new();

    let (expected, _) = registry.next_in_queue(height, true, &h.ctx(), &ledger);
    let expected = expected.expect("a masternode qualifies");

    ledger.updated_block_tip(tip, &mut registry, &h.ctx());
    assert_eq!(ledger.get_block_payee(height), Some(expected.payee()));
    assert_eq!(ledger.vote_count(), 1);
    assert_eq!(h.network.relayed().len(), 1);
}

#[test]
fn low_ranked_masternode_does_not_vote() {
    let mut h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let height = h.tip() + VOTE_AHEAD;
    let me = by_rank(&registry, &nodes, height, &h)[12];
    h.act_as(me);
    let mut ledger = PaymentLedger::new();

    assert!(!ledger.process_block(height, &mut registry, &h.ctx()));
    assert_eq!(ledger.vote_count(), 0);
}

#[test]
fn fill_block_payee_prefers_votes_over_the_local_queue() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 2;
    let payment = Amount::from_coins(30);

    let queued = ledger
        .fill_block_payee(height, payment, &mut registry, &h.ctx())
        .expect("queue winner");
    assert_eq!(queued.value, payment);

    let voted = nodes[24].payee();
    ledger
        .process_payment_vote(&peer(), nodes[0].vote(height, &voted), &mut registry, &h.ctx())
        .unwrap();
    let out = ledger
        .fill_block_payee(height, payment, &mut registry, &h.ctx())
        .unwrap();
    assert_eq!(out, TxOut::new(voted, payment));
}

// ── Sync ────────────────────────────────────────────────────────────────

#[test]
fn payment_sync_serves_upcoming_votes_once() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let tip = h.tip();
    let ranked = by_rank(&registry, &nodes, tip + 3, &h);
    for node in &ranked[..3] {
        ledger
            .process_payment_vote(&peer(), node.vote(tip + 3, &nodes[0].payee()), &mut registry, &h.ctx())
            .unwrap();
    }
    // Past votes are not part of the sync answer.
    ledger
        .process_payment_vote(&peer(), nodes[0].vote(tip - 1, &nodes[0].payee()), &mut registry, &h.ctx())
        .unwrap();

    let asker = PeerInfo::new(9, "7.7.7.7:18444".parse().unwrap(), PROTOCOL_VERSION);
    assert_eq!(ledger.process_payment_sync(&asker, &h.ctx()), Ok(3));
    let sent = h.network.sent_to(asker.id);
    assert!(matches!(&sent[0], WireMessage::Inventory(inv) if inv.len() == 3));
    assert_eq!(
        sent.last(),
        Some(&WireMessage::SyncStatusCount(SyncStatusCount {
            item: SyncItem::Winners,
            count: 3
        }))
    );

    let rejection = ledger.process_payment_sync(&asker, &h.ctx()).unwrap_err();
    assert_eq!(rejection.dos, 20);
    assert_eq!(rejection.reason, PaymentRejectReason::AlreadyRequested);
}

#[test]
fn low_data_blocks_are_requested() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let tip = h.tip();
    let full = tip - 10;
    let thin = tip - 11;
    for node in &nodes[..6] {
        ledger
            .process_payment_vote(&peer(), node.vote(full, &nodes[20].payee()), &mut registry, &h.ctx())
            .unwrap();
    }
    ledger
        .process_payment_vote(&peer(), nodes[0].vote(thin, &nodes[20].payee()), &mut registry, &h.ctx())
        .unwrap();

    let asker = PeerInfo::new(9, "7.7.7.7:18444".parse().unwrap(), PROTOCOL_VERSION);
    ledger.request_low_data_payment_blocks(&asker, registry.size(), &h.ctx());

    let sent = h.network.sent_to(asker.id);
    assert_eq!(sent.len(), 1);
    let WireMessage::GetData(inv) = &sent[0] else {
        panic!("expected GetData, got {:?}", sent[0]);
    };
    // Every height without votes, plus the thin block.
    assert_eq!(inv.len(), (tip as usize + 1) - 2 + 1);
    let thin_hash = h.chain.block_hash(thin).unwrap();
    let full_hash = h.chain.block_hash(full).unwrap();
    assert!(inv.contains(&Inventory::PaymentBlock(thin_hash)));
    assert!(!inv.contains(&Inventory::PaymentBlock(full_hash)));
}

#[test]
fn ledger_snapshot_survives_restart() {
    let h = Harness::new();
    let (mut registry, nodes) = populated(&h);
    let mut ledger = PaymentLedger::new();
    let height = h.tip() - 4;
    for node in &nodes[..4] {
        ledger
            .process_payment_vote(&peer(), node.vote(height, &nodes[7].payee()), &mut registry, &h.ctx())
            .unwrap();
    }
    let restored = PaymentLedger::deserialize(&ledger.serialize().unwrap()).unwrap();
    assert_eq!(restored.vote_count(), 4);
    assert_eq!(restored.get_block_payee(height), Some(nodes[7].payee()));
    assert_eq!(restored.get_block_votes(height).len(), 4);
}
