//! Shared engine handles and inbound message dispatch.
//!
//! [`NodeHandle`] is cheap to clone and is what the host's P2P layer calls
//! into. Engines sit behind their own `tokio::sync::Mutex`; whenever more
//! than one is needed they are locked in the order
//! `ActiveMasternode → Registry → PaymentLedger → PoseVerifier`.

use std::sync::Arc;
use std::time::Instant;

use lmnode_chain::{ChainView, Clock, Random, SporkView, SyncStatus, TxOut};
use lmnode_messages::{Inventory, WireMessage, MAX_INV_SIZE};
use lmnode_network::{FulfilledRequests, PeerId, PeerInfo, PeerNetwork};
use lmnode_payments::PaymentLedger;
use lmnode_pose::PoseVerifier;
use lmnode_registry::{
    ActiveMasternode, Context, LocalIdentity, MasternodeInfo, Registry, Rejection,
};
use lmnode_sync::MasternodeSync;
use lmnode_types::{Amount, ConsensusParams};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::NodeMetrics;

/// Misbehaviour score for an oversized inventory or getdata.
const OVERSIZED_INVENTORY_DOS: u32 = 20;

/// Collaborators supplied by the host node.
#[derive(Clone)]
pub struct Host {
    pub chain: Arc<dyn ChainView>,
    pub network: Arc<dyn PeerNetwork>,
    pub sporks: Arc<dyn SporkView>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn Random>,
}

#[derive(Clone)]
pub struct NodeHandle {
    pub params: Arc<ConsensusParams>,
    pub host: Host,
    pub fulfilled: Arc<FulfilledRequests>,
    pub sync: Arc<MasternodeSync>,
    pub registry: Arc<Mutex<Registry>>,
    pub payments: Arc<Mutex<PaymentLedger>>,
    pub pose: Arc<Mutex<PoseVerifier>>,
    pub active: Option<Arc<Mutex<ActiveMasternode>>>,
    /// Copy of the active masternode's identity, refreshed after every state change.
    identity: Arc<std::sync::Mutex<Option<LocalIdentity>>>,
    pub metrics: Arc<NodeMetrics>,
}

impl NodeHandle {
    pub fn new(
        params: ConsensusParams,
        host: Host,
        registry: Registry,
        payments: PaymentLedger,
        active: Option<ActiveMasternode>,
    ) -> Self {
        let sync = MasternodeSync::new(
            params.clone(),
            Arc::clone(&host.chain),
            Arc::clone(&host.network),
            Arc::clone(&host.clock),
            active.is_some(),
        );
        let identity = active.as_ref().map(ActiveMasternode::identity);
        Self {
            params: Arc::new(params),
            host,
            fulfilled: Arc::new(FulfilledRequests::default()),
            sync: Arc::new(sync),
            registry: Arc::new(Mutex::new(registry)),
            payments: Arc::new(Mutex::new(payments)),
            pose: Arc::new(Mutex::new(PoseVerifier::new())),
            active: active.map(|a| Arc::new(Mutex::new(a))),
            identity: Arc::new(std::sync::Mutex::new(identity)),
            metrics: Arc::new(NodeMetrics::new()),
        }
    }

    /// Borrow every collaborator for one engine call.
    pub fn context(&self) -> Context<'_> {
        Context {
            params: &self.params,
            chain: &*self.host.chain,
            network: &*self.host.network,
            sporks: &*self.host.sporks,
            sync: &*self.sync,
            clock: &*self.host.clock,
            random: &*self.host.random,
            fulfilled: &self.fulfilled,
            local: self.identity.lock().unwrap().clone(),
        }
    }

    pub fn is_masternode(&self) -> bool {
        self.active.is_some()
    }

    // ── Inbound messages ────────────────────────────────────────────────

    /// Handle one message received from `from`.
    ///
    /// Registry and proof-of-service messages are dropped until the base
    /// chain is synced.
    pub async fn handle_message(&self, from: PeerId, message: WireMessage) {
        let Some(peer) = self.host.network.peer(from) else {
            debug!(%from, command = message.command(), "message from unknown peer dropped");
            return;
        };
        let registry_message = matches!(
            message,
            WireMessage::Announce(_)
                | WireMessage::Ping(_)
                | WireMessage::ListRequest(_)
                | WireMessage::Verify(_)
        );
        if registry_message && !self.sync.is_blockchain_synced() {
            debug!(peer = %peer.id, command = message.command(), "blockchain not synced, dropping");
            return;
        }
        let started = Instant::now();

        match message {
            WireMessage::Announce(mnb) => {
                let own_activation = {
                    let mut registry = self.registry.lock().await;
                    let ctx = self.context();
                    match registry.check_and_update_broadcast(Some(&peer), mnb, &ctx) {
                        Ok(true) => self.metrics.broadcasts_accepted.inc(),
                        Ok(false) => {}
                        Err(rejection) => {
                            self.metrics.broadcasts_rejected.inc();
                            self.punish(&peer, "mnb", &rejection);
                        }
                    }
                    registry.take_own_activation()
                };
                if own_activation {
                    self.manage_local().await;
                }
            }
            WireMessage::Ping(ping) => {
                let mut registry = self.registry.lock().await;
                let ctx = self.context();
                match registry.process_ping(&peer, ping, &ctx) {
                    Ok(()) => self.metrics.pings_accepted.inc(),
                    Err(rejection) => self.punish(&peer, "mnp", &rejection),
                }
            }
            WireMessage::PaymentVote(vote) => {
                let mut registry = self.registry.lock().await;
                let mut payments = self.payments.lock().await;
                let ctx = self.context();
                match payments.process_payment_vote(&peer, vote, &mut registry, &ctx) {
                    Ok(()) => self.metrics.payment_votes_accepted.inc(),
                    Err(rejection) => self.punish(&peer, "mnw", &rejection),
                }
            }
            WireMessage::PaymentSync { count_needed } => {
                let payments = self.payments.lock().await;
                let ctx = self.context();
                debug!(peer = %peer.id, count_needed, "payment sync requested");
                match payments.process_payment_sync(&peer, &ctx) {
                    Ok(sent) => debug!(peer = %peer.id, sent, "payment sync served"),
                    Err(rejection) => self.punish(&peer, "mnget", &rejection),
                }
            }
            WireMessage::ListRequest(outpoint) => {
                let mut registry = self.registry.lock().await;
                let ctx = self.context();
                match registry.process_list_request(&peer, outpoint, &ctx) {
                    Ok(sent) => debug!(peer = %peer.id, sent, "list request served"),
                    Err(rejection) => self.punish(&peer, "dseg", &rejection),
                }
            }
            WireMessage::SyncStatusCount(count) => {
                self.sync.process_sync_status_count(&peer, &count);
            }
            WireMessage::Verify(mnv) => {
                let mut registry = self.registry.lock().await;
                let mut pose = self.pose.lock().await;
                let ctx = self.context();
                self.metrics.verifications_processed.inc();
                if let Err(rejection) = pose.process_verify(&peer, mnv, &mut registry, &ctx) {
                    self.punish(&peer, "mnv", &rejection);
                }
            }
            WireMessage::Inventory(items) => self.on_inventory(&peer, items).await,
            WireMessage::GetData(items) => self.serve_get_data(&peer, items).await,
            WireMessage::GetSporks => {
                debug!(peer = %peer.id, "spork requests are answered by the host");
            }
        }

        self.metrics
            .message_process_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
    }

    /// Apply the misbehaviour score a rejection carries.
    fn punish<R: std::fmt::Display>(&self, peer: &PeerInfo, command: &str, rejection: &Rejection<R>) {
        if rejection.dos > 0 {
            warn!(peer = %peer.id, command, %rejection, "misbehaving peer");
            self.host.network.misbehaving(peer.id, rejection.dos);
            self.metrics.misbehaviour_reports.inc();
        } else {
            debug!(peer = %peer.id, command, %rejection, "message dropped");
        }
    }

    fn oversized(&self, peer: &PeerInfo, command: &str, len: usize) -> bool {
        if len <= MAX_INV_SIZE {
            return false;
        }
        warn!(peer = %peer.id, command, len, "oversized inventory");
        self.host.network.misbehaving(peer.id, OVERSIZED_INVENTORY_DOS);
        self.metrics.misbehaviour_reports.inc();
        true
    }

    /// Ask for announced objects we do not have yet.
    async fn on_inventory(&self, peer: &PeerInfo, items: Vec<Inventory>) {
        if self.oversized(peer, "inv", items.len()) {
            return;
        }
        let wanted: Vec<Inventory> = {
            let registry = self.registry.lock().await;
            let payments = self.payments.lock().await;
            let pose = self.pose.lock().await;
            items
                .into_iter()
                .filter(|item| !self.already_have(item, &registry, &payments, &pose))
                .collect()
        };
        if wanted.is_empty() {
            return;
        }
        debug!(peer = %peer.id, count = wanted.len(), "requesting announced objects");
        self.host.network.send(peer.id, WireMessage::GetData(wanted));
    }

    fn already_have(
        &self,
        item: &Inventory,
        registry: &Registry,
        payments: &PaymentLedger,
        pose: &PoseVerifier,
    ) -> bool {
        match item {
            Inventory::Announce(hash) => registry.has_seen_broadcast(hash),
            Inventory::Ping(hash) => registry.has_seen_ping(hash),
            Inventory::PaymentVote(hash) => payments.has_vote(hash),
            Inventory::PaymentBlock(block) => self
                .host
                .chain
                .block_height(block)
                .is_some_and(|height| payments.block_payees(height).is_some()),
            Inventory::Verify(hash) => pose.has_seen(hash),
        }
    }

    /// Answer a getdata with every object we can serve.
    pub async fn serve_get_data(&self, peer: &PeerInfo, items: Vec<Inventory>) {
        if self.oversized(peer, "getdata", items.len()) {
            return;
        }
        let registry = self.registry.lock().await;
        let payments = self.payments.lock().await;
        let pose = self.pose.lock().await;
        let network = &self.host.network;

        for item in items {
            match item {
                Inventory::Announce(hash) => {
                    if let Some(mnb) = registry.get_broadcast(&hash) {
                        network.send(peer.id, WireMessage::Announce(mnb));
                    }
                }
                Inventory::Ping(hash) => {
                    if let Some(ping) = registry.get_ping(&hash) {
                        network.send(peer.id, WireMessage::Ping(ping));
                    }
                }
                Inventory::PaymentVote(hash) => {
                    if let Some(vote) = payments.get_vote(&hash) {
                        network.send(peer.id, WireMessage::PaymentVote(vote.clone()));
                    }
                }
                Inventory::PaymentBlock(block) => {
                    let Some(height) = self.host.chain.block_height(&block) else {
                        continue;
                    };
                    for vote in payments.get_block_votes(height) {
                        network.send(peer.id, WireMessage::PaymentVote(vote));
                    }
                }
                Inventory::Verify(hash) => {
                    if let Some(mnv) = pose.get_verification(&hash) {
                        network.send(peer.id, WireMessage::Verify(mnv));
                    }
                }
            }
        }
    }

    // ── Periodic work ───────────────────────────────────────────────────

    /// One sync tick, then at most one scheduled recovery request.
    pub async fn sync_tick(&self) {
        {
            let mut registry = self.registry.lock().await;
            let payments = self.payments.lock().await;
            let ctx = self.context();
            self.sync.process_tick(&mut registry, &payments, &ctx);
        }
        self.metrics.sync_asset.set(i64::from(self.sync.asset().id()));
        self.process_scheduled_request().await;
    }

    /// Connect to a masternode we scheduled a recovery request for and ask
    /// for the announcements.
    pub async fn process_scheduled_request(&self) {
        let Some((addr, hashes)) = self.registry.lock().await.pop_scheduled_request() else {
            return;
        };
        match self.host.network.connect_masternode(addr) {
            Ok(peer) => {
                debug!(%addr, %peer, count = hashes.len(), "asking for announcements");
                let items = hashes.into_iter().map(Inventory::Announce).collect();
                self.host.network.send(peer, WireMessage::GetData(items));
            }
            Err(e) => debug!(%addr, "cannot reach masternode: {e}"),
        }
    }

    /// Expire stale state, score duplicate addresses and challenge peers.
    ///
    /// Does nothing until the base chain is synced.
    pub async fn maintenance(&self) {
        if !self.sync.is_blockchain_synced() {
            debug!("blockchain not synced, skipping maintenance");
            return;
        }
        {
            let mut registry = self.registry.lock().await;
            let mut payments = self.payments.lock().await;
            let mut pose = self.pose.lock().await;
            let ctx = self.context();

            registry.check_and_remove(&ctx);
            payments.check_and_remove(registry.size(), &ctx);
            pose.check_and_remove(&ctx);
            pose.check_same_addr(&mut registry, &ctx);
            if ctx.is_masternode() {
                let sent = pose.do_full_verification_step(&registry, &ctx);
                if sent > 0 {
                    debug!(sent, "verification requests sent");
                }
            }
            registry.check_and_rebuild_index(ctx.now());
            self.fulfilled.check_and_remove(ctx.now());
        }
        self.close_masternode_connections();
        self.refresh_metrics().await;
    }

    /// Drop the short-lived connections opened for recovery and verification.
    pub fn close_masternode_connections(&self) {
        if self.params.is_regtest() {
            return;
        }
        for peer in self.host.network.peers() {
            if peer.masternode_connection {
                debug!(peer = %peer.id, addr = %peer.addr, "closing masternode connection");
                self.host.network.disconnect(peer.id);
            }
        }
    }

    /// A new block was connected at `height`.
    pub async fn block_connected(&self, height: u32) {
        self.sync.updated_block_tip(height);
        self.sync.blockchain_synced(true);

        let mut registry = self.registry.lock().await;
        let mut payments = self.payments.lock().await;
        let ctx = self.context();
        if ctx.is_masternode() {
            registry.update_last_paid(&ctx, &*payments);
        }
        payments.updated_block_tip(height, &mut registry, &ctx);
    }

    /// Step the local masternode's activation and refresh its identity.
    pub async fn manage_local(&self) {
        let Some(active) = &self.active else {
            return;
        };
        let mut active = active.lock().await;
        let mut registry = self.registry.lock().await;
        let before = active.state().clone();
        active.manage_state(&mut registry, &self.context());
        *self.identity.lock().unwrap() = Some(active.identity());
        if *active.state() != before {
            info!(state = active.state().as_str(), "local masternode state changed");
        }
    }

    pub async fn refresh_metrics(&self) {
        let (size, enabled) = {
            let registry = self.registry.lock().await;
            let ctx = self.context();
            (registry.size(), registry.count_enabled(ctx.min_payments_proto()))
        };
        let (blocks, votes) = {
            let payments = self.payments.lock().await;
            (payments.block_count(), payments.vote_count())
        };
        self.metrics.registry_size.set(size as i64);
        self.metrics.enabled_count.set(enabled as i64);
        self.metrics.payment_blocks.set(blocks as i64);
        self.metrics.payment_votes.set(votes as i64);
    }

    // ── Block assembly and validation ───────────────────────────────────

    pub async fn is_block_payee_valid(&self, coinbase: &[TxOut], height: u32) -> bool {
        let payments = self.payments.lock().await;
        payments.is_block_payee_valid(coinbase, height, &self.context())
    }

    /// The masternode output for a block template at `height`.
    pub async fn fill_block_payee(&self, height: u32, block_reward: Amount) -> Option<TxOut> {
        let mut registry = self.registry.lock().await;
        let payments = self.payments.lock().await;
        let ctx = self.context();
        let payment = ctx.params.masternode_payment(height, block_reward);
        payments.fill_block_payee(height, payment, &mut registry, &ctx)
    }

    pub async fn get_required_payments_string(&self, height: u32) -> String {
        self.payments.lock().await.get_required_payments_string(height)
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub async fn masternode_list(&self) -> Vec<MasternodeInfo> {
        self.registry.lock().await.get_full_list()
    }

    pub async fn count_enabled(&self) -> usize {
        let registry = self.registry.lock().await;
        registry.count_enabled(self.context().min_payments_proto())
    }

    /// Human-readable state of the local masternode, if any.
    pub async fn local_status(&self) -> Option<String> {
        let active = self.active.as_ref()?;
        Some(active.lock().await.state().to_string())
    }
}
