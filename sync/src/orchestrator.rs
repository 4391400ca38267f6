//! Staged sync of masternode data from connected peers.
//!
//! Each tick asks at most one peer for the current asset, so each peer gets
//! one request per tick interval. An asset finishes when its data stops
//! arriving for `SYNC_TIMEOUT_SECONDS`, or earlier once the payment ledger
//! holds enough votes. The registry and the payment ledger read progress
//! through [`SyncStatus`] while their own locks are held, so all state lives
//! in atomics and the tick never holds a lock across calls into them.

use crate::asset::SyncAsset;
use crate::constants::*;
use crate::error::SyncError;
use lmnode_chain::{ChainView, Clock, SyncStatus};
use lmnode_messages::{SyncStatusCount, WireMessage};
use lmnode_network::{FulfilledRequests, PeerInfo, PeerNetwork, RequestTag};
use lmnode_payments::PaymentLedger;
use lmnode_registry::{Context, Registry};
use lmnode_types::{ConsensusParams, NetworkId, Timestamp};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// State of the "is the base chain synced" heuristic.
struct BlockchainCheck {
    synced: bool,
    last_process: Timestamp,
    skipped: u32,
    first_block_accepted: bool,
}

pub struct MasternodeSync {
    params: ConsensusParams,
    chain: Arc<dyn ChainView>,
    network: Arc<dyn PeerNetwork>,
    clock: Arc<dyn Clock>,
    /// Inbound peers this early are most likely other masternodes probing us.
    is_masternode: bool,

    asset: AtomicI32,
    attempt: AtomicU32,
    tick: AtomicU64,
    time_asset_started: AtomicU64,
    time_last_list: AtomicU64,
    time_last_payment: AtomicU64,
    time_last_failure: AtomicU64,
    count_failures: AtomicU32,
    current_height: AtomicU64,
    has_tip: AtomicBool,

    check: Mutex<BlockchainCheck>,
}

impl MasternodeSync {
    pub fn new(
        params: ConsensusParams,
        chain: Arc<dyn ChainView>,
        network: Arc<dyn PeerNetwork>,
        clock: Arc<dyn Clock>,
        is_masternode: bool,
    ) -> Self {
        let now = clock.now();
        let sync = Self {
            params,
            chain,
            network,
            clock,
            is_masternode,
            asset: AtomicI32::new(SyncAsset::Initial.id()),
            attempt: AtomicU32::new(0),
            tick: AtomicU64::new(0),
            time_asset_started: AtomicU64::new(0),
            time_last_list: AtomicU64::new(0),
            time_last_payment: AtomicU64::new(0),
            time_last_failure: AtomicU64::new(0),
            count_failures: AtomicU32::new(0),
            current_height: AtomicU64::new(0),
            has_tip: AtomicBool::new(false),
            check: Mutex::new(BlockchainCheck {
                synced: false,
                last_process: now,
                skipped: 0,
                first_block_accepted: false,
            }),
        };
        sync.reset();
        sync
    }

    // ── State ───────────────────────────────────────────────────────────

    pub fn asset(&self) -> SyncAsset {
        SyncAsset::try_from(self.asset.load(Ordering::SeqCst)).unwrap_or(SyncAsset::Failed)
    }

    fn set_asset(&self, asset: SyncAsset) {
        self.asset.store(asset.id(), Ordering::SeqCst);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    pub fn is_failed(&self) -> bool {
        self.asset() == SyncAsset::Failed
    }

    pub fn status(&self) -> &'static str {
        self.asset().status()
    }

    /// Rough progress in `[0, 1]`, for display only.
    pub fn progress(&self) -> f64 {
        let asset = f64::from(self.asset().id());
        let attempt = f64::from(self.attempt());
        let per_asset = f64::from(ATTEMPTS_PER_ASSET);
        (attempt + (asset - 1.0) * per_asset) / (per_asset * 4.0)
    }

    fn now_secs(&self) -> u64 {
        self.clock.now().as_secs()
    }

    pub fn reset(&self) {
        let now = self.now_secs();
        self.set_asset(SyncAsset::Initial);
        self.attempt.store(0, Ordering::SeqCst);
        self.time_asset_started.store(now, Ordering::SeqCst);
        self.time_last_list.store(now, Ordering::SeqCst);
        self.time_last_payment.store(now, Ordering::SeqCst);
        self.time_last_failure.store(0, Ordering::SeqCst);
        self.count_failures.store(0, Ordering::SeqCst);
    }

    fn fail(&self) {
        self.time_last_failure.store(self.now_secs(), Ordering::SeqCst);
        self.count_failures.fetch_add(1, Ordering::SeqCst);
        self.set_asset(SyncAsset::Failed);
    }

    /// Move on to the next asset. Starting from scratch clears the per-peer
    /// sync markers so every peer is asked again.
    pub fn switch_to_next_asset(&self, fulfilled: &FulfilledRequests) -> Result<(), SyncError> {
        let now = self.now_secs();
        let next = match self.asset() {
            SyncAsset::Failed => return Err(SyncError::SwitchFromFailed),
            SyncAsset::Initial => {
                for tag in [
                    RequestTag::SporkSync,
                    RequestTag::ListSync,
                    RequestTag::PaymentSync,
                    RequestTag::FullSync,
                ] {
                    fulfilled.remove_all(tag);
                }
                SyncAsset::Sporks
            }
            SyncAsset::Sporks => {
                self.time_last_list.store(now, Ordering::SeqCst);
                SyncAsset::List
            }
            SyncAsset::List => {
                self.time_last_payment.store(now, Ordering::SeqCst);
                SyncAsset::Winners
            }
            SyncAsset::Winners | SyncAsset::Finished => SyncAsset::Finished,
        };
        self.set_asset(next);
        if next == SyncAsset::Finished {
            info!("masternode sync has finished");
        } else {
            info!(asset = %next, "starting sync asset");
        }
        self.attempt.store(0, Ordering::SeqCst);
        self.time_asset_started.store(now, Ordering::SeqCst);
        Ok(())
    }

    fn advance(&self, fulfilled: &FulfilledRequests) {
        if let Err(err) = self.switch_to_next_asset(fulfilled) {
            warn!(%err, "cannot switch sync asset");
        }
    }

    /// Record the new tip.
    pub fn updated_block_tip(&self, height: u32) {
        self.current_height.store(u64::from(height), Ordering::SeqCst);
        self.has_tip.store(true, Ordering::SeqCst);
    }

    fn current_height(&self) -> Option<u32> {
        if !self.has_tip.load(Ordering::SeqCst) {
            return None;
        }
        u32::try_from(self.current_height.load(Ordering::SeqCst)).ok()
    }

    // ── Base chain ──────────────────────────────────────────────────────

    /// Whether `peer` is at (about) our height.
    fn check_node_height(&self, peer: &PeerInfo, height: u32) -> bool {
        let (Some(common), Some(synced)) = (peer.common_height, peer.sync_height) else {
            return false;
        };
        if height.saturating_sub(1) > common {
            debug!(%peer.id, height, common, "skipping stuck peer");
            return false;
        }
        if height < synced.saturating_sub(1) {
            debug!(%peer.id, height, synced, "skipping peer that announced more headers than we have blocks");
            return false;
        }
        true
    }

    /// Heuristic "the base chain is synced" check.
    ///
    /// `block_accepted` is set when called for a newly connected block.
    /// Checks without a new block run at most once per tick interval.
    pub fn blockchain_synced(&self, block_accepted: bool) -> bool {
        let now = self.clock.now();
        let mut check = self.check.lock().unwrap();

        // The host slept: start over.
        if check.last_process.elapsed_since(now) > SLEEP_RESET_SECONDS {
            info!(synced = check.synced, "no sync check for an hour, restarting sync");
            self.reset();
            check.synced = false;
        }

        let (Some(tip), Some(best)) = (self.chain.tip_height(), self.chain.best_header_height())
        else {
            return false;
        };
        if self.chain.is_importing() {
            return false;
        }

        if block_accepted {
            // Only relevant while we are still syncing.
            if !self.is_synced() {
                check.first_block_accepted = true;
                check.synced = false;
                check.last_process = now;
                return false;
            }
        } else if check.last_process.elapsed_since(now) < SYNC_TICK_SECONDS {
            check.skipped += 1;
            return check.synced;
        }

        debug!(synced = check.synced, skipped = check.skipped, "checking whether the chain is synced");
        check.last_process = now;
        check.skipped = 0;

        if check.synced {
            return true;
        }

        let peers = self.network.peers();
        if peers.len() >= SYNC_ENOUGH_PEERS {
            let at_height = peers
                .iter()
                .filter(|p| self.check_node_height(p, tip))
                .count();
            if at_height >= SYNC_ENOUGH_PEERS {
                info!(at_height, "found enough peers on the same height as we are");
                check.synced = true;
                return true;
            }
        }

        // Wait for at least one new block.
        if !check.first_block_accepted {
            return false;
        }

        let newest = [self.chain.block_time(tip), self.chain.block_time(best)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or_default();
        check.synced = best.saturating_sub(tip) < MAX_HEADERS_AHEAD
            && newest.elapsed_since(now) < self.params.max_tip_age_secs;
        check.synced
    }

    // ── Messages ────────────────────────────────────────────────────────

    /// A peer told us how many items it announced.
    pub fn process_sync_status_count(&self, peer: &PeerInfo, count: &SyncStatusCount) {
        if self.is_synced() || self.is_failed() {
            return;
        }
        info!(item = ?count.item, count = count.count, %peer.id, "got inventory count");
    }

    // ── Tick ────────────────────────────────────────────────────────────

    /// One step of the sync. Call once a second.
    pub fn process_tick(&self, registry: &mut Registry, payments: &PaymentLedger, ctx: &Context) {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        if tick % SYNC_TICK_SECONDS != 0 {
            return;
        }
        if self.current_height().is_none() {
            return;
        }
        let min_proto = ctx.min_payments_proto();
        let mn_count = registry.count_masternodes(min_proto);
        debug!(
            tick,
            mn_count,
            asset = %self.asset(),
            attempt = self.attempt(),
            progress = self.progress(),
            "sync tick"
        );

        if self.is_synced() {
            // Lost every masternode after sleep or failed to sync originally.
            if mn_count == 0 {
                warn!("not enough data, restarting sync");
                self.reset();
            } else {
                return;
            }
        }

        if self.is_failed() {
            let since = self.time_last_failure.load(Ordering::SeqCst);
            if since + FAILURE_COOLDOWN_SECONDS < self.now_secs() {
                self.reset();
            }
            return;
        }

        let regtest = self.params.network == NetworkId::Regtest;
        if !regtest && !self.blockchain_synced(false) && self.asset() > SyncAsset::Sporks {
            // Hold the timers until the chain catches up.
            let now = self.now_secs();
            self.time_last_list.store(now, Ordering::SeqCst);
            self.time_last_payment.store(now, Ordering::SeqCst);
            return;
        }
        if self.asset() == SyncAsset::Initial
            || (self.asset() == SyncAsset::Sporks && self.blockchain_synced(false))
        {
            self.advance(ctx.fulfilled);
        }

        for peer in ctx.network.peers() {
            // Masternode connections are short lived and unreliable for sync.
            if peer.masternode_connection || (self.is_masternode && peer.inbound) {
                continue;
            }

            if regtest {
                self.quick_step(&peer, mn_count, registry, ctx);
                return;
            }

            if self.sync_peer(&peer, min_proto, registry, payments, ctx) {
                return;
            }
        }
    }

    /// Regtest: one request per tick on a fixed schedule, then finish.
    fn quick_step(&self, peer: &PeerInfo, mn_count: usize, registry: &mut Registry, ctx: &Context) {
        let attempt = self.attempt();
        if attempt <= 2 {
            ctx.network.send(peer.id, WireMessage::GetSporks);
        } else if attempt < 4 {
            registry.dseg_update(peer, ctx);
        } else if attempt < 6 {
            ctx.network.send(
                peer.id,
                WireMessage::PaymentSync {
                    count_needed: mn_count as u32,
                },
            );
        } else {
            self.set_asset(SyncAsset::Finished);
            info!("masternode sync has finished");
        }
        self.attempt.fetch_add(1, Ordering::SeqCst);
    }

    /// Ask `peer` for the current asset. Returns `true` when the tick is done.
    fn sync_peer(
        &self,
        peer: &PeerInfo,
        min_proto: u32,
        registry: &mut Registry,
        payments: &PaymentLedger,
        ctx: &Context,
    ) -> bool {
        let now = ctx.now();
        let fulfilled = ctx.fulfilled;

        if fulfilled.has(&peer.addr, RequestTag::FullSync, now) {
            // Free the slot for another peer.
            info!(%peer.id, "disconnecting from recently synced peer");
            ctx.network.disconnect(peer.id);
            return false;
        }

        if !fulfilled.has(&peer.addr, RequestTag::SporkSync, now) {
            fulfilled.add(&peer.addr, RequestTag::SporkSync, now);
            ctx.network.send(peer.id, WireMessage::GetSporks);
            info!(asset = %self.asset(), %peer.id, "requesting sporks");
            // Sporks first, then on to the next peer without waiting.
            return false;
        }

        match self.asset() {
            SyncAsset::List => {
                let last = self.time_last_list.load(Ordering::SeqCst);
                if last + SYNC_TIMEOUT_SECONDS < now.as_secs() {
                    self.on_timeout(fulfilled);
                    return true;
                }
                if fulfilled.has(&peer.addr, RequestTag::ListSync, now) {
                    return false;
                }
                fulfilled.add(&peer.addr, RequestTag::ListSync, now);
                if peer.version < min_proto {
                    return false;
                }
                self.attempt.fetch_add(1, Ordering::SeqCst);
                registry.dseg_update(peer, ctx);
                true
            }
            SyncAsset::Winners => {
                let last = self.time_last_payment.load(Ordering::SeqCst);
                // New blocks keep feeding votes, so this may take longer than
                // the timeout; it still ends eventually.
                if last + SYNC_TIMEOUT_SECONDS < now.as_secs() {
                    self.on_timeout(fulfilled);
                    return true;
                }
                // Ask at least two peers even when we already have enough.
                if self.attempt() > 1 && payments.is_enough_data(registry.size()) {
                    info!(%peer.id, "found enough payment data");
                    fulfilled.add(&peer.addr, RequestTag::FullSync, now);
                    self.advance(fulfilled);
                    return true;
                }
                if fulfilled.has(&peer.addr, RequestTag::PaymentSync, now) {
                    return false;
                }
                fulfilled.add(&peer.addr, RequestTag::PaymentSync, now);
                if peer.version < min_proto {
                    return false;
                }
                self.attempt.fetch_add(1, Ordering::SeqCst);

                let limit = payments.storage_limit(registry.size());
                ctx.network
                    .send(peer.id, WireMessage::PaymentSync { count_needed: limit });
                payments.request_low_data_payment_blocks(peer, registry.size(), ctx);
                true
            }
            _ => false,
        }
    }

    /// The current asset stopped receiving data.
    fn on_timeout(&self, fulfilled: &FulfilledRequests) {
        let asset = self.asset();
        info!(%asset, "sync asset timed out");
        if self.attempt() == 0 {
            // Nobody answered: no point going on without this data.
            warn!(%asset, "failed to sync");
            self.fail();
            return;
        }
        self.advance(fulfilled);
    }
}

impl SyncStatus for MasternodeSync {
    fn is_blockchain_synced(&self) -> bool {
        self.blockchain_synced(false)
    }

    fn is_list_synced(&self) -> bool {
        self.asset() > SyncAsset::List
    }

    fn is_winners_list_synced(&self) -> bool {
        self.asset() > SyncAsset::Winners
    }

    fn is_synced(&self) -> bool {
        self.asset() == SyncAsset::Finished
    }

    fn added_list_item(&self) {
        self.time_last_list.store(self.now_secs(), Ordering::SeqCst);
    }

    fn added_payment_vote(&self) {
        self.time_last_payment.store(self.now_secs(), Ordering::SeqCst);
    }
}
