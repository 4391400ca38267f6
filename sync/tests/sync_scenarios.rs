//! Staged sync against nullable peers.

use lmnode_chain::{ChainView, SyncStatus};
use lmnode_messages::{Inventory, PaymentVote, WireMessage};
use lmnode_network::{FulfilledRequests, PeerId, PeerInfo};
use lmnode_nullables::{NullChain, NullClock, NullNetwork, NullRandom, NullSporks};
use lmnode_payments::PaymentLedger;
use lmnode_registry::{Context, Registry};
use lmnode_sync::constants::*;
use lmnode_sync::{MasternodeSync, SyncAsset};
use lmnode_types::{ConsensusParams, NetworkId, Outpoint, Script, TxHash, PROTOCOL_VERSION};
use std::sync::Arc;

const T0: u64 = 1_600_000_000;
const SPACING: u64 = 60;

struct Harness {
    params: ConsensusParams,
    chain: Arc<NullChain>,
    network: Arc<NullNetwork>,
    clock: Arc<NullClock>,
    sporks: NullSporks,
    random: NullRandom,
    fulfilled: FulfilledRequests,
    sync: MasternodeSync,
    registry: Registry,
    payments: PaymentLedger,
}

impl Harness {
    fn new(network: NetworkId) -> Self {
        Self::with_blocks(network, 300)
    }

    fn with_blocks(network: NetworkId, blocks: u32) -> Self {
        let params = ConsensusParams::for_network(network);
        let chain = Arc::new(NullChain::with_blocks(blocks, T0, SPACING));
        let peers = Arc::new(NullNetwork::new());
        let clock = Arc::new(NullClock::new(T0 + u64::from(blocks) * SPACING));
        let sync = MasternodeSync::new(
            params.clone(),
            chain.clone(),
            peers.clone(),
            clock.clone(),
            false,
        );
        sync.updated_block_tip(blocks - 1);
        Self {
            params,
            chain,
            network: peers,
            clock,
            sporks: NullSporks::new(),
            random: NullRandom::constant(0),
            fulfilled: FulfilledRequests::default(),
            sync,
            registry: Registry::new(),
            payments: PaymentLedger::new(),
        }
    }

    fn tip(&self) -> u32 {
        self.chain.tip_height().unwrap()
    }

    /// One sync step: a tick interval of one-second ticks.
    fn step(&mut self) {
        for _ in 0..SYNC_TICK_SECONDS {
            let ctx = Context {
                params: &self.params,
                chain: &*self.chain,
                network: &*self.network,
                sporks: &self.sporks,
                sync: &self.sync,
                clock: &*self.clock,
                random: &self.random,
                fulfilled: &self.fulfilled,
                local: None,
            };
            self.sync
                .process_tick(&mut self.registry, &self.payments, &ctx);
        }
        self.clock.advance(SYNC_TICK_SECONDS);
    }

    fn steps(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    fn add_peer(&self, id: u64, synced: bool) {
        let mut peer = PeerInfo::new(id, format!("192.0.2.{id}:18444").parse().unwrap(), PROTOCOL_VERSION);
        if synced {
            peer.common_height = Some(self.tip());
            peer.sync_height = Some(self.tip());
        }
        self.network.add_peer(peer);
    }

    fn sent_kinds(&self, peer: u64) -> Vec<&'static str> {
        self.network
            .sent_to(PeerId(peer))
            .iter()
            .map(WireMessage::command)
            .collect()
    }
}

#[test]
fn list_waits_for_the_base_chain() {
    let mut h = Harness::new(NetworkId::Test);
    h.add_peer(1, false);

    h.steps(5);
    assert_eq!(h.sync.asset(), SyncAsset::Sporks);
    assert_eq!(h.sent_kinds(1), vec!["getsporks"]);
    assert!(!h.sync.is_list_synced());

    // Three more peers at our height: the chain counts as synced.
    for id in 2..=4 {
        h.add_peer(id, true);
    }
    h.step();
    assert_eq!(h.sync.asset(), SyncAsset::List);
    assert_eq!(h.sent_kinds(1), vec!["getsporks", "dseg"]);
    assert_eq!(h.sync.attempt(), 1);
}

#[test]
fn one_peer_is_asked_for_the_list_per_step() {
    let mut h = Harness::new(NetworkId::Test);
    for id in 1..=3 {
        h.add_peer(id, true);
    }
    // Sporks from everyone, then the chain check.
    h.steps(2);
    assert_eq!(h.sync.asset(), SyncAsset::List);

    h.step();
    h.step();
    let asked: usize = (1..=3)
        .filter(|id| h.sent_kinds(*id).contains(&"dseg"))
        .count();
    assert_eq!(asked, h.sync.attempt() as usize);
    assert!(asked >= 2);
}

#[test]
fn list_and_winners_time_out_into_finished() {
    let mut h = Harness::new(NetworkId::Test);
    for id in 1..=3 {
        h.add_peer(id, true);
    }
    h.steps(3);
    assert_eq!(h.sync.asset(), SyncAsset::List);

    // New list entries keep the asset alive.
    for _ in 0..10 {
        h.sync.added_list_item();
        h.step();
    }
    assert_eq!(h.sync.asset(), SyncAsset::List);

    // Silence for longer than the timeout.
    h.steps(7);
    assert_eq!(h.sync.asset(), SyncAsset::Winners);
    assert!(h.sync.is_list_synced());
    assert!(!h.sync.is_winners_list_synced());

    let payment_sync = h
        .network
        .sent_to(PeerId(1))
        .into_iter()
        .find_map(|m| match m {
            WireMessage::PaymentSync { count_needed } => Some(count_needed),
            _ => None,
        });
    assert_eq!(payment_sync, Some(5000));
    // Nothing is stored, so every known block is asked for too.
    let low_data = h
        .network
        .sent_to(PeerId(1))
        .into_iter()
        .filter_map(|m| match m {
            WireMessage::GetData(items) => Some(items),
            _ => None,
        })
        .flatten()
        .filter(|i| matches!(i, Inventory::PaymentBlock(_)))
        .count();
    assert_eq!(low_data, 300);

    // Without enough votes only the timeout ends the stage.
    h.steps(3);
    assert_eq!(h.sync.asset(), SyncAsset::Winners);
    h.steps(2);
    assert_eq!(h.sync.asset(), SyncAsset::Finished);
    assert!(h.sync.is_synced());
}

#[test]
fn enough_payment_data_finishes_early() {
    let mut h = Harness::with_blocks(NetworkId::Test, 5200);
    for id in 1..=3 {
        h.add_peer(id, true);
    }
    {
        let ctx = Context {
            params: &h.params,
            chain: &*h.chain,
            network: &*h.network,
            sporks: &h.sporks,
            sync: &h.sync,
            clock: &*h.clock,
            random: &h.random,
            fulfilled: &h.fulfilled,
            local: None,
        };
        let payee = Script::new(vec![1; 25]);
        for height in 102..=5102 {
            for voter in 1..=9u8 {
                let outpoint = Outpoint::new(TxHash::new([voter; 32]), 0);
                h.payments
                    .add_payment_vote(PaymentVote::new(outpoint, height, payee.clone()), &ctx);
            }
        }
    }
    assert!(h.payments.is_enough_data(0));

    for _ in 0..3 {
        h.sync.switch_to_next_asset(&h.fulfilled).unwrap();
    }
    assert_eq!(h.sync.asset(), SyncAsset::Winners);

    // Chain check, sporks from everyone, then two peers asked for votes.
    h.steps(4);
    assert_eq!(h.sync.asset(), SyncAsset::Winners);
    assert_eq!(h.sync.attempt(), 2);

    h.step();
    assert_eq!(h.sync.asset(), SyncAsset::Finished);
}

#[test]
fn finished_with_an_empty_registry_starts_over() {
    let mut h = Harness::new(NetworkId::Test);
    h.add_peer(1, true);
    for _ in 0..4 {
        h.sync.switch_to_next_asset(&h.fulfilled).unwrap();
    }
    assert!(h.sync.is_synced());

    h.step();
    assert_eq!(h.sync.asset(), SyncAsset::Sporks);
}

#[test]
fn list_nobody_serves_fails_then_recovers() {
    let mut h = Harness::new(NetworkId::Test);
    for id in 1..=3 {
        let mut peer = PeerInfo::new(id, format!("192.0.2.{id}:18444").parse().unwrap(), 70000);
        peer.common_height = Some(h.tip());
        peer.sync_height = Some(h.tip());
        h.network.add_peer(peer);
    }
    h.steps(2);
    assert_eq!(h.sync.asset(), SyncAsset::List);

    // Outdated peers are never asked, so the timeout finds no attempt.
    h.steps(7);
    assert!(h.sync.is_failed());
    assert_eq!(h.sync.status(), "Synchronization failed");

    h.steps(11);
    assert!(!h.sync.is_failed());
}

#[test]
fn masternode_connections_are_not_used_for_sync() {
    let mut h = Harness::new(NetworkId::Test);
    let mut peer = PeerInfo::new(1, "192.0.2.1:18444".parse().unwrap(), PROTOCOL_VERSION);
    peer.masternode_connection = true;
    h.network.add_peer(peer);

    h.steps(3);
    assert!(h.network.sent().is_empty());
}

#[test]
fn recently_synced_peers_are_dropped() {
    let mut h = Harness::new(NetworkId::Test);
    h.add_peer(1, true);
    h.step();
    h.fulfilled.add(
        &"192.0.2.1:18444".parse().unwrap(),
        lmnode_network::RequestTag::FullSync,
        lmnode_chain::Clock::now(&*h.clock),
    );
    h.step();
    assert_eq!(h.network.disconnected(), vec![PeerId(1)]);
}

#[test]
fn regtest_runs_the_quick_schedule() {
    let mut h = Harness::new(NetworkId::Regtest);
    h.add_peer(1, false);

    h.steps(6);
    assert_eq!(h.sync.asset(), SyncAsset::Sporks);
    assert_eq!(
        h.sent_kinds(1),
        vec!["getsporks", "getsporks", "getsporks", "dseg", "mnget", "mnget"]
    );

    h.step();
    assert!(h.sync.is_synced());
    assert_eq!(h.sent_kinds(1).len(), 6);
}
