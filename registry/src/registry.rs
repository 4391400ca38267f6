//! The masternode registry: records, seen maps and recovery bookkeeping.
//!
//! The registry is a plain `&mut self` engine. The node wraps it in a
//! `tokio::sync::Mutex` and passes a [`Context`] into every call that needs
//! the chain, the network or the clock.

use crate::constants::*;
use crate::context::Context;
use crate::error::RegistryError;
use crate::index::MasternodeIndex;
use crate::record::{CheckEnv, MasternodeInfo, MasternodeRecord};
use crate::schedule::PaymentSchedule;
use lmnode_messages::{Broadcast, ObjectHash, Ping};
use lmnode_types::{Amount, MasternodeState, Outpoint, PublicKey, Script, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info, warn};

/// Version tag written at the head of a registry snapshot.
pub const REGISTRY_SNAPSHOT_VERSION: &str = "LMNodeRegistry-Version-4";

/// A broadcast we have seen, with the time we last saw it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenBroadcast {
    pub seen_at: Timestamp,
    pub broadcast: Broadcast,
}

/// Peers asked for one broadcast during recovery.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// Replies are evaluated once this time has passed.
    pub expires: Timestamp,
    /// Peers that have not answered yet.
    pub peers: HashSet<SocketAddr>,
}

fn first_run() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Registry {
    pub(crate) records: Vec<MasternodeRecord>,
    /// Peers that asked us for the full list, and until when they may not ask again.
    pub(crate) asked_us_for_list: HashMap<SocketAddr, Timestamp>,
    /// Peers we asked for the full list.
    pub(crate) we_asked_for_list: HashMap<SocketAddr, Timestamp>,
    /// Single entries we asked for, per peer.
    pub(crate) we_asked_for_entry: HashMap<Outpoint, HashMap<SocketAddr, Timestamp>>,
    pub(crate) recovery_requests: HashMap<ObjectHash, RecoveryRequest>,
    pub(crate) recovery_replies: HashMap<ObjectHash, Vec<Broadcast>>,
    pub(crate) seen_broadcasts: HashMap<ObjectHash, SeenBroadcast>,
    pub(crate) seen_pings: HashMap<ObjectHash, Ping>,
    pub(crate) last_watchdog_vote: Timestamp,
    index: MasternodeIndex,

    #[serde(skip)]
    last_index_rebuild: Timestamp,
    /// Connections to open for recovery requests, popped by the node.
    #[serde(skip)]
    pub(crate) scheduled_requests: Vec<(SocketAddr, ObjectHash)>,
    #[serde(skip)]
    pub(crate) added: bool,
    #[serde(skip)]
    pub(crate) removed: bool,
    #[serde(skip)]
    pub(crate) own_activation: bool,
    #[serde(skip, default = "first_run")]
    first_paid_scan: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            asked_us_for_list: HashMap::new(),
            we_asked_for_list: HashMap::new(),
            we_asked_for_entry: HashMap::new(),
            recovery_requests: HashMap::new(),
            recovery_replies: HashMap::new(),
            seen_broadcasts: HashMap::new(),
            seen_pings: HashMap::new(),
            last_watchdog_vote: Timestamp::EPOCH,
            index: MasternodeIndex::new(),
            last_index_rebuild: Timestamp::EPOCH,
            scheduled_requests: Vec::new(),
            added: false,
            removed: false,
            own_activation: false,
            first_paid_scan: true,
        }
    }

    // ── Membership ──────────────────────────────────────────────────────

    /// Insert `record` unless its collateral is already known.
    pub fn add(&mut self, record: MasternodeRecord) -> bool {
        if self.has(&record.outpoint) {
            return false;
        }
        debug!(addr = %record.addr, count = self.records.len() + 1, "adding new masternode");
        self.index.add(record.outpoint);
        self.records.push(record);
        self.added = true;
        true
    }

    pub fn has(&self, outpoint: &Outpoint) -> bool {
        self.position(outpoint).is_some()
    }

    pub(crate) fn position(&self, outpoint: &Outpoint) -> Option<usize> {
        self.records.iter().position(|r| &r.outpoint == outpoint)
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget everything, including the seen maps and the index.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn records(&self) -> &[MasternodeRecord] {
        &self.records
    }

    /// Mutable view of the records. The slice cannot grow or shrink, so the
    /// collateral index stays consistent.
    pub fn records_mut(&mut self) -> &mut [MasternodeRecord] {
        &mut self.records
    }

    pub fn find(&self, outpoint: &Outpoint) -> Option<&MasternodeRecord> {
        self.records.iter().find(|r| &r.outpoint == outpoint)
    }

    pub fn find_by_service_key(&self, key: &PublicKey) -> Option<&MasternodeRecord> {
        self.records.iter().find(|r| &r.service_key == key)
    }

    pub fn find_by_payee(&self, payee: &Script) -> Option<&MasternodeRecord> {
        self.records.iter().find(|r| &r.payee() == payee)
    }

    /// Run `f` against the record for `outpoint`.
    pub fn with_record_mut<R>(
        &mut self,
        outpoint: &Outpoint,
        f: impl FnOnce(&mut MasternodeRecord) -> R,
    ) -> Option<R> {
        self.records
            .iter_mut()
            .find(|r| &r.outpoint == outpoint)
            .map(f)
    }

    pub fn get_info(&self, outpoint: &Outpoint) -> Option<MasternodeInfo> {
        self.find(outpoint).map(MasternodeRecord::info)
    }

    pub fn get_info_by_service_key(&self, key: &PublicKey) -> Option<MasternodeInfo> {
        self.find_by_service_key(key).map(MasternodeRecord::info)
    }

    pub fn get_info_by_payee(&self, payee: &Script) -> Option<MasternodeInfo> {
        self.find_by_payee(payee).map(MasternodeRecord::info)
    }

    pub fn get_full_list(&self) -> Vec<MasternodeInfo> {
        self.records.iter().map(MasternodeRecord::info).collect()
    }

    /// Records at or above `min_proto`.
    pub fn count_masternodes(&self, min_proto: u32) -> usize {
        self.records
            .iter()
            .filter(|r| r.protocol_version >= min_proto)
            .count()
    }

    /// Enabled records at or above `min_proto`.
    pub fn count_enabled(&self, min_proto: u32) -> usize {
        self.records
            .iter()
            .filter(|r| r.protocol_version >= min_proto && r.is_enabled())
            .count()
    }

    /// Number of records announcing an IPv4 address.
    pub fn count_by_ipv4(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.addr.ip(), IpAddr::V4(_)))
            .count()
    }

    /// State of the record for `outpoint`; unknown collaterals need a new start.
    pub fn state_of(&self, outpoint: &Outpoint) -> MasternodeState {
        self.find(outpoint)
            .map_or(MasternodeState::NewStartRequired, |r| r.state)
    }

    // ── State checks ────────────────────────────────────────────────────

    pub(crate) fn check_env(&self, now: Timestamp) -> CheckEnv {
        CheckEnv {
            registry_size: self.records.len(),
            watchdog_active: self.is_watchdog_active(now),
        }
    }

    pub(crate) fn check_record(&mut self, idx: usize, ctx: &Context, force: bool) {
        let env = self.check_env(ctx.now());
        if let Some(record) = self.records.get_mut(idx) {
            record.check(ctx, env, force);
        }
    }

    /// Recompute the state of every record.
    pub fn check(&mut self, ctx: &Context) {
        let env = self.check_env(ctx.now());
        for record in &mut self.records {
            record.check(ctx, env, false);
        }
    }

    pub fn check_masternode(&mut self, outpoint: &Outpoint, ctx: &Context, force: bool) {
        if let Some(idx) = self.position(outpoint) {
            self.check_record(idx, ctx, force);
        }
    }

    pub fn check_masternode_by_key(&mut self, key: &PublicKey, ctx: &Context, force: bool) {
        if let Some(idx) = self.records.iter().position(|r| &r.service_key == key) {
            self.check_record(idx, ctx, force);
        }
    }

    pub fn is_pinged_within(&self, outpoint: &Outpoint, seconds: u64, at: Timestamp) -> bool {
        self.find(outpoint)
            .is_some_and(|r| r.is_pinged_within(seconds, at))
    }

    /// Store `ping` as the last ping of its record and of the record's seen broadcast.
    pub fn set_last_ping(&mut self, ping: Ping) {
        let Some(idx) = self.position(&ping.outpoint) else {
            return;
        };
        self.seen_pings.insert(ping.hash(), ping.clone());
        let hash = self.records[idx].to_broadcast().hash();
        if let Some(seen) = self.seen_broadcasts.get_mut(&hash) {
            seen.broadcast.last_ping = Some(ping.clone());
        }
        self.records[idx].last_ping = Some(ping);
    }

    pub fn update_watchdog_vote_time(&mut self, outpoint: &Outpoint, now: Timestamp) {
        if let Some(record) = self.records.iter_mut().find(|r| &r.outpoint == outpoint) {
            record.last_watchdog_vote = now;
            self.last_watchdog_vote = now;
        }
    }

    /// Whether a watchdog vote was seen anywhere in the last two hours.
    pub fn is_watchdog_active(&self, now: Timestamp) -> bool {
        !self.last_watchdog_vote.is_epoch()
            && self.last_watchdog_vote.elapsed_since(now) <= WATCHDOG_MAX_SECONDS
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Periodic sweep: drop spent collaterals, drive broadcast recovery and
    /// expire the request bookkeeping.
    pub fn check_and_remove(&mut self, ctx: &Context) {
        if !ctx.sync.is_list_synced() {
            return;
        }
        self.check(ctx);
        let now = ctx.now();

        let spent: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state == MasternodeState::OutpointSpent)
            .map(|(i, _)| i)
            .collect();
        for &idx in &spent {
            let record = &self.records[idx];
            info!(
                addr = %record.addr,
                state = %record.state,
                count = self.records.len() - 1,
                "removing masternode"
            );
            let hash = record.to_broadcast().hash();
            self.seen_broadcasts.remove(&hash);
            self.recovery_requests.remove(&hash);
            self.we_asked_for_entry.remove(&record.outpoint);
        }
        if !spent.is_empty() {
            self.records
                .retain(|r| r.state != MasternodeState::OutpointSpent);
            self.removed = true;
        }

        self.schedule_recovery(ctx);
        self.process_recovery_replies(ctx);

        self.recovery_requests
            .retain(|_, request| request.expires.elapsed_since(now) <= MNB_RECOVERY_RETRY_SECONDS);
        self.asked_us_for_list.retain(|_, until| *until >= now);
        self.we_asked_for_list.retain(|_, until| *until >= now);
        for asked in self.we_asked_for_entry.values_mut() {
            asked.retain(|_, until| *until >= now);
        }
        self.we_asked_for_entry.retain(|_, asked| !asked.is_empty());
        self.seen_pings
            .retain(|_, ping| !ping.is_expired(NEW_START_REQUIRED_SECONDS, now));

        debug!("{}", self);

        if self.removed {
            self.check_and_rebuild_index(now);
        }
    }

    /// Ask top-ranked peers for broadcasts of records that need a new start.
    fn schedule_recovery(&mut self, ctx: &Context) {
        let Some(tip) = ctx.tip() else {
            return;
        };
        let now = ctx.now();
        let candidates: Vec<(Outpoint, ObjectHash)> = self
            .records
            .iter()
            .filter(|r| r.state == MasternodeState::NewStartRequired)
            .map(|r| (r.outpoint, r.to_broadcast().hash()))
            .filter(|(_, hash)| !self.recovery_requests.contains_key(hash))
            .collect();

        let mut ask_budget = MNB_RECOVERY_MAX_ASK_ENTRIES;
        let mut ranks = None;
        for (outpoint, hash) in candidates {
            if ask_budget == 0 || !ctx.sync.is_synced() {
                break;
            }
            let ranks: &Vec<(u32, MasternodeInfo)> =
                ranks.get_or_insert_with(|| self.get_ranks(ctx.random.below(tip), 0, ctx));
            let asked = self.we_asked_for_entry.get(&outpoint);
            let mut requested = HashSet::new();
            for (_, info) in ranks {
                if requested.len() >= MNB_RECOVERY_QUORUM_TOTAL {
                    break;
                }
                if asked.is_some_and(|peers| peers.contains_key(&info.addr)) {
                    continue;
                }
                requested.insert(info.addr);
                self.scheduled_requests.push((info.addr, hash));
            }
            if !requested.is_empty() {
                debug!(%outpoint, peers = requested.len(), "asking for broadcast recovery");
                ask_budget -= 1;
            }
            self.recovery_requests.insert(
                hash,
                RecoveryRequest {
                    expires: now.plus_secs(MNB_RECOVERY_WAIT_SECONDS),
                    peers: requested,
                },
            );
        }
    }

    /// Re-apply broadcasts that enough peers vouched for.
    fn process_recovery_replies(&mut self, ctx: &Context) {
        let now = ctx.now();
        let due: Vec<ObjectHash> = self
            .recovery_replies
            .keys()
            .filter(|hash| {
                self.recovery_requests
                    .get(*hash)
                    .map_or(true, |request| request.expires < now)
            })
            .copied()
            .collect();
        for hash in due {
            let Some(replies) = self.recovery_replies.remove(&hash) else {
                continue;
            };
            if replies.len() < MNB_RECOVERY_QUORUM_REQUIRED {
                continue;
            }
            let mut mnb = replies[0].clone();
            mnb.recovery = true;
            debug!(outpoint = %mnb.outpoint, replies = replies.len(), "reprocessing recovered broadcast");
            if let Err(rejection) = self.check_and_update_broadcast(None, mnb, ctx) {
                debug!(%rejection, "recovered broadcast rejected");
            }
        }
    }

    /// Next peer to connect to for recovery, with every hash to request from it.
    pub fn pop_scheduled_request(&mut self) -> Option<(SocketAddr, Vec<ObjectHash>)> {
        if self.scheduled_requests.is_empty() {
            return None;
        }
        self.scheduled_requests.sort();
        let addr = self.scheduled_requests[0].0;
        let mut hashes = Vec::new();
        self.scheduled_requests.retain(|(a, hash)| {
            if *a == addr {
                hashes.push(*hash);
                false
            } else {
                true
            }
        });
        hashes.dedup();
        Some((addr, hashes))
    }

    /// Compact the collateral index once it has grown well past the live set.
    /// Returns whether a rebuild happened.
    pub fn check_and_rebuild_index(&mut self, now: Timestamp) -> bool {
        if !self.last_index_rebuild.is_epoch()
            && self.last_index_rebuild.elapsed_since(now) < MIN_INDEX_REBUILD_SECONDS
        {
            return false;
        }
        if self.index.len() <= MAX_EXPECTED_INDEX_SIZE || self.index.len() <= self.records.len() {
            return false;
        }
        self.index.clear();
        for record in &self.records {
            self.index.add(record.outpoint);
        }
        self.last_index_rebuild = now;
        info!(size = self.index.len(), "rebuilt masternode index");
        true
    }

    pub fn index(&self) -> &MasternodeIndex {
        &self.index
    }

    // ── Last paid ───────────────────────────────────────────────────────

    /// Refresh the last-paid block of every record from the chain and the
    /// payment votes.
    pub fn update_last_paid(&mut self, ctx: &Context, schedule: &dyn PaymentSchedule) {
        let Some(tip) = ctx.tip() else {
            return;
        };
        let max_scan = if self.first_paid_scan || !ctx.is_masternode() {
            storage_limit(self.records.len())
        } else {
            LAST_PAID_SCAN_BLOCKS
        };
        debug!(tip, max_scan, "updating last paid");
        for record in &mut self.records {
            update_record_last_paid(record, tip, max_scan, ctx, schedule);
        }
        self.first_paid_scan = !ctx.sync.is_winners_list_synced();
    }

    // ── Notifications ───────────────────────────────────────────────────

    /// Whether records were added or removed since the last call.
    pub fn take_updates(&mut self) -> (bool, bool) {
        (
            std::mem::take(&mut self.added),
            std::mem::take(&mut self.removed),
        )
    }

    /// Whether our own broadcast was just accepted and the local masternode
    /// should re-evaluate its state.
    pub fn take_own_activation(&mut self) -> bool {
        std::mem::take(&mut self.own_activation)
    }

    // ── Seen objects ────────────────────────────────────────────────────

    pub fn get_broadcast(&self, hash: &ObjectHash) -> Option<Broadcast> {
        self.seen_broadcasts.get(hash).map(|s| s.broadcast.clone())
    }

    pub fn get_ping(&self, hash: &ObjectHash) -> Option<Ping> {
        self.seen_pings.get(hash).cloned()
    }

    pub fn has_seen_broadcast(&self, hash: &ObjectHash) -> bool {
        self.seen_broadcasts.contains_key(hash)
    }

    pub fn has_seen_ping(&self, hash: &ObjectHash) -> bool {
        self.seen_pings.contains_key(hash)
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn serialize(&self) -> Result<Vec<u8>, RegistryError> {
        bincode::serialize(&(REGISTRY_SNAPSHOT_VERSION, self))
            .map_err(|e| RegistryError::Encode(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, RegistryError> {
        let version: String =
            bincode::deserialize(bytes).map_err(|e| RegistryError::Decode(e.to_string()))?;
        if version != REGISTRY_SNAPSHOT_VERSION {
            return Err(RegistryError::VersionMismatch {
                expected: REGISTRY_SNAPSHOT_VERSION.to_string(),
                found: version,
            });
        }
        let (_, registry): (String, Registry) =
            bincode::deserialize(bytes).map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok(registry)
    }
}

fn update_record_last_paid(
    record: &mut MasternodeRecord,
    tip: u32,
    max_scan: u32,
    ctx: &Context,
    schedule: &dyn PaymentSchedule,
) {
    let payee = record.payee();
    let mut height = tip;
    let mut scanned = 0;
    while height > record.last_paid_height && scanned < max_scan {
        if schedule.has_payee_with_votes(height, &payee, 2) {
            match ctx.chain.coinbase_outputs(height) {
                Ok(outputs) => {
                    let value = outputs
                        .iter()
                        .try_fold(Amount::ZERO, |acc, o| acc.checked_add(o.value))
                        .unwrap_or(Amount::ZERO);
                    let share = ctx.params.masternode_payment(height, value);
                    if outputs.iter().any(|o| o.script == payee && o.value == share) {
                        record.last_paid_height = height;
                        record.last_paid_time = ctx.chain.block_time(height).unwrap_or_default();
                        debug!(outpoint = %record.outpoint, height, "found last payment");
                        return;
                    }
                }
                Err(e) => warn!(height, error = %e, "cannot read coinbase"),
            }
        }
        if height == 0 {
            break;
        }
        height -= 1;
        scanned += 1;
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LMNodes: {}, peers who asked us for LMNode list: {}, peers we asked for LMNode list: {}, \
             entries in LMNode list we asked for: {}, lmnode index size: {}",
            self.records.len(),
            self.asked_us_for_list.len(),
            self.we_asked_for_list.len(),
            self.we_asked_for_entry.len(),
            self.index.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmnode_crypto::keypair_from_seed;
    use lmnode_types::TxHash;

    fn record(b: u8) -> MasternodeRecord {
        let collateral = keypair_from_seed(&[b; 32]);
        let service = keypair_from_seed(&[b.wrapping_add(100); 32]);
        let mnb = Broadcast::new(
            Outpoint::new(TxHash::new([b; 32]), 0),
            format!("10.0.0.{b}:18444").parse().unwrap(),
            collateral.public,
            service.public,
            90024,
            Timestamp::new(1_000_000),
        );
        MasternodeRecord::from_broadcast(&mnb, true)
    }

    #[test]
    fn add_is_idempotent_per_collateral() {
        let mut registry = Registry::new();
        assert!(registry.add(record(1)));
        assert!(!registry.add(record(1)));
        assert!(registry.add(record(2)));
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.index().len(), 2);
        assert_eq!(registry.take_updates(), (true, false));
        assert_eq!(registry.take_updates(), (false, false));
    }

    #[test]
    fn lookups_by_key_and_payee() {
        let mut registry = Registry::new();
        let r = record(3);
        registry.add(r.clone());
        assert_eq!(
            registry.find_by_service_key(&r.service_key).map(|r| r.outpoint),
            Some(r.outpoint)
        );
        assert_eq!(
            registry.get_info_by_payee(&r.payee()).map(|i| i.outpoint),
            Some(r.outpoint)
        );
        assert!(registry.get_info(&Outpoint::NULL).is_none());
        assert_eq!(registry.state_of(&Outpoint::NULL), MasternodeState::NewStartRequired);
    }

    #[test]
    fn counts_respect_protocol_floor() {
        let mut registry = Registry::new();
        let mut old = record(4);
        old.protocol_version = 90000;
        old.state = MasternodeState::Enabled;
        let mut new = record(5);
        new.state = MasternodeState::Enabled;
        registry.add(old);
        registry.add(new);
        assert_eq!(registry.count_masternodes(0), 2);
        assert_eq!(registry.count_masternodes(90024), 1);
        assert_eq!(registry.count_enabled(90024), 1);
        assert_eq!(registry.count_by_ipv4(), 2);
    }

    #[test]
    fn watchdog_activity_window() {
        let mut registry = Registry::new();
        let r = record(6);
        registry.add(r.clone());
        let now = Timestamp::new(2_000_000);
        assert!(!registry.is_watchdog_active(now));
        registry.update_watchdog_vote_time(&r.outpoint, now);
        assert!(registry.is_watchdog_active(now.plus_secs(WATCHDOG_MAX_SECONDS)));
        assert!(!registry.is_watchdog_active(now.plus_secs(WATCHDOG_MAX_SECONDS + 1)));
    }

    #[test]
    fn scheduled_requests_group_by_peer() {
        let mut registry = Registry::new();
        let a: SocketAddr = "10.0.0.1:18444".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:18444".parse().unwrap();
        registry.scheduled_requests = vec![
            (b, ObjectHash([1; 32])),
            (a, ObjectHash([2; 32])),
            (a, ObjectHash([3; 32])),
        ];
        let (addr, hashes) = registry.pop_scheduled_request().unwrap();
        assert_eq!(addr, a);
        assert_eq!(hashes, vec![ObjectHash([2; 32]), ObjectHash([3; 32])]);
        assert_eq!(registry.pop_scheduled_request().unwrap().0, b);
        assert!(registry.pop_scheduled_request().is_none());
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut registry = Registry::new();
        registry.add(record(7));
        registry.add(record(8));
        registry
            .asked_us_for_list
            .insert("10.0.0.9:18444".parse().unwrap(), Timestamp::new(5));
        let bytes = registry.serialize().unwrap();
        let back = Registry::deserialize(&bytes).unwrap();
        assert_eq!(back.records(), registry.records());
        assert_eq!(back.asked_us_for_list, registry.asked_us_for_list);
        assert_eq!(back.index(), registry.index());
        assert!(back.first_paid_scan);
    }

    #[test]
    fn snapshot_with_foreign_version_is_rejected() {
        let bytes = bincode::serialize(&("LMNodeRegistry-Version-3", Registry::new())).unwrap();
        assert!(matches!(
            Registry::deserialize(&bytes),
            Err(RegistryError::VersionMismatch { .. })
        ));
        assert!(Registry::deserialize(&[1, 2, 3]).is_err());
    }

    /// Pad the index with collateral that no longer has a record.
    fn pad_index(registry: &mut Registry, to: usize) {
        let mut n = 0;
        while registry.index.len() < to {
            registry.index.add(Outpoint::new(TxHash::new([0xee; 32]), n));
            n += 1;
        }
    }

    #[test]
    fn index_at_the_size_threshold_is_kept() {
        let mut registry = Registry::new();
        registry.add(record(1));
        pad_index(&mut registry, MAX_EXPECTED_INDEX_SIZE);
        assert!(!registry.check_and_rebuild_index(Timestamp::new(10_000)));
        assert_eq!(registry.index().len(), MAX_EXPECTED_INDEX_SIZE);
    }

    #[test]
    fn rebuild_drops_removed_collateral() {
        let mut registry = Registry::new();
        registry.add(record(1));
        registry.add(record(2));
        pad_index(&mut registry, MAX_EXPECTED_INDEX_SIZE + 1);
        let stale = Outpoint::new(TxHash::new([0xee; 32]), 0);
        assert!(registry.index().index_of(&stale).is_some());

        assert!(registry.check_and_rebuild_index(Timestamp::new(10_000)));
        assert_eq!(registry.index().len(), 2);
        assert_eq!(registry.index().index_of(&stale), None);
        assert_eq!(registry.index().index_of(&record(1).outpoint), Some(0));
        assert_eq!(registry.index().index_of(&record(2).outpoint), Some(1));
    }

    #[test]
    fn rebuild_runs_at_most_once_per_hour() {
        let mut registry = Registry::new();
        registry.add(record(1));
        let first = Timestamp::new(10_000);
        pad_index(&mut registry, MAX_EXPECTED_INDEX_SIZE + 1);
        assert!(registry.check_and_rebuild_index(first));

        pad_index(&mut registry, MAX_EXPECTED_INDEX_SIZE + 1);
        let soon = first.plus_secs(MIN_INDEX_REBUILD_SECONDS - 1);
        assert!(!registry.check_and_rebuild_index(soon));
        assert_eq!(registry.index().len(), MAX_EXPECTED_INDEX_SIZE + 1);

        assert!(registry.check_and_rebuild_index(first.plus_secs(MIN_INDEX_REBUILD_SECONDS)));
        assert_eq!(registry.index().len(), 1);
    }

    #[test]
    fn summary_mentions_size() {
        let mut registry = Registry::new();
        registry.add(record(9));
        assert!(registry.to_string().starts_with("LMNodes: 1,"));
    }
}
