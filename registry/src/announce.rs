//! Inbound announcements, pings and list requests.

use crate::constants::*;
use crate::context::Context;
use crate::error::{RejectReason, Rejection};
use crate::record::MasternodeRecord;
use crate::registry::{Registry, SeenBroadcast};
use crate::validation::{check_outpoint, check_signature, ping_simple_check, simple_check};
use lmnode_messages::{
    Broadcast, Inventory, ObjectHash, Ping, SyncItem, SyncStatusCount, WireMessage, MAX_INV_SIZE,
};
use lmnode_network::PeerInfo;
use lmnode_types::{is_local_addr, MasternodeState, NetworkId, Outpoint, PROTOCOL_VERSION};
use tracing::{debug, info, warn};

impl Registry {
    // ── Broadcasts ──────────────────────────────────────────────────────

    /// Admit or apply an announcement.
    ///
    /// `from` is the peer that relayed it, `None` for announcements we
    /// reprocess ourselves. `Ok(true)` means the announcement is known now,
    /// whether it was new or already seen.
    pub fn check_and_update_broadcast(
        &mut self,
        from: Option<&PeerInfo>,
        mnb: Broadcast,
        ctx: &Context,
    ) -> Result<bool, Rejection> {
        let now = ctx.now();
        let hash = mnb.hash();
        debug!(outpoint = %mnb.outpoint, %hash, "checking announcement");

        if !mnb.recovery {
            if let Some(seen) = self.seen_broadcasts.get_mut(&hash) {
                debug!(outpoint = %mnb.outpoint, "announcement already seen");
                if seen.seen_at.elapsed_since(now) > NEW_START_REQUIRED_SECONDS - 2 * MIN_MNP_SECONDS {
                    seen.seen_at = now;
                    ctx.sync.added_list_item();
                }
                if let Some(peer) = from {
                    self.count_recovery_reply(peer, &hash, &mnb, ctx);
                }
                return Ok(true);
            }
        }
        self.seen_broadcasts.insert(
            hash,
            SeenBroadcast {
                seen_at: now,
                broadcast: mnb.clone(),
            },
        );

        let ping_valid = simple_check(&mnb, ctx)?;

        if let Some(idx) = self.position(&mnb.outpoint) {
            let old_hash = self.records[idx].to_broadcast().hash();
            self.update_from_broadcast(idx, &mnb, ctx)?;
            if hash != old_hash {
                self.seen_broadcasts.remove(&old_hash);
            }
            return Ok(true);
        }

        if let Err(rejection) = check_outpoint(&mnb, ctx) {
            if rejection.reason.is_transient() {
                // Let the announcement be rechecked when it arrives again.
                self.seen_broadcasts.remove(&hash);
            }
            debug!(outpoint = %mnb.outpoint, %rejection, "collateral check failed");
            return Err(rejection);
        }

        let own = ctx.is_own_service_key(&mnb.service_key);
        let mut record = MasternodeRecord::from_broadcast(&mnb, ping_valid);
        if own {
            record.pose_ban_score = -POSE_BAN_MAX_SCORE;
        }
        self.add(record);
        ctx.sync.added_list_item();
        self.check_masternode(&mnb.outpoint, ctx, true);

        if own {
            if mnb.protocol_version != PROTOCOL_VERSION {
                warn!(
                    proto = mnb.protocol_version,
                    expected = PROTOCOL_VERSION,
                    "own announcement uses another protocol, re-activate the masternode"
                );
                return Err(Rejection::soft(RejectReason::OwnProtocolMismatch(
                    mnb.protocol_version,
                )));
            }
            info!(outpoint = %mnb.outpoint, "got our own announcement, activating");
            self.own_activation = true;
        }

        ctx.network.relay(Inventory::Announce(hash));
        Ok(true)
    }

    /// Count a broadcast from a peer we asked during recovery.
    fn count_recovery_reply(
        &mut self,
        peer: &PeerInfo,
        hash: &ObjectHash,
        mnb: &Broadcast,
        ctx: &Context,
    ) {
        let now = ctx.now();
        match self.recovery_requests.get_mut(hash) {
            Some(request) if now < request.expires => {
                if !request.peers.remove(&peer.addr) {
                    return;
                }
            }
            _ => return,
        }

        let stored_ping = self
            .seen_broadcasts
            .get(hash)
            .and_then(|s| s.broadcast.last_ping.as_ref())
            .map(|p| p.sig_time);
        let reply_ping = mnb.last_ping.as_ref().map(|p| p.sig_time);
        if reply_ping <= stored_ping {
            return;
        }

        let mut simulated = MasternodeRecord::from_broadcast(mnb, true);
        let env = self.check_env(now);
        simulated.check(ctx, env, false);
        debug!(
            outpoint = %mnb.outpoint,
            %peer.id,
            state = %simulated.state,
            "recovery reply"
        );
        if simulated.state.is_valid_for_auto_start() {
            self.recovery_replies
                .entry(*hash)
                .or_default()
                .push(mnb.clone());
        }
    }

    /// Apply an announcement to an existing record.
    fn update_from_broadcast(
        &mut self,
        idx: usize,
        mnb: &Broadcast,
        ctx: &Context,
    ) -> Result<(), Rejection> {
        let now = ctx.now();
        {
            let record = &self.records[idx];
            if record.sig_time == mnb.sig_time && !mnb.recovery {
                return Err(Rejection::soft(RejectReason::DuplicateSigTime));
            }
            if record.sig_time > mnb.sig_time {
                debug!(
                    outpoint = %mnb.outpoint,
                    stored = record.sig_time.as_secs(),
                    got = mnb.sig_time.as_secs(),
                    "announcement older than the stored one"
                );
                return Err(Rejection::soft(RejectReason::OlderThanStored));
            }
        }

        self.check_record(idx, ctx, false);
        let record = &self.records[idx];
        if record.is_pose_banned() {
            return Err(Rejection::soft(RejectReason::PoseBanned));
        }
        if record.collateral_key != mnb.collateral_key {
            return Err(Rejection::new(33, RejectReason::CollateralKeyMismatch));
        }
        check_signature(mnb)?;

        let own = ctx.is_own_service_key(&mnb.service_key);
        if !record.is_broadcasted_within(MIN_MNB_SECONDS, now) || own {
            info!(outpoint = %mnb.outpoint, addr = %mnb.addr, "got updated masternode entry");
            if self.apply_broadcast(idx, mnb, ctx) {
                self.check_record(idx, ctx, false);
                ctx.network.relay(Inventory::Announce(mnb.hash()));
            }
            ctx.sync.added_list_item();
        }
        Ok(())
    }

    /// Copy the identity fields of a newer announcement into a record.
    /// Returns whether the announcement took effect.
    pub(crate) fn apply_broadcast(&mut self, idx: usize, mnb: &Broadcast, ctx: &Context) -> bool {
        {
            let record = &mut self.records[idx];
            if mnb.sig_time <= record.sig_time && !mnb.recovery {
                return false;
            }
            record.service_key = mnb.service_key.clone();
            record.sig_time = mnb.sig_time;
            record.signature = mnb.signature.clone();
            record.protocol_version = mnb.protocol_version;
            record.addr = mnb.addr;
            record.pose_ban_score = 0;
            record.pose_ban_height = 0;
            record.last_checked = Default::default();
        }

        match &mnb.last_ping {
            None => self.records[idx].last_ping = None,
            Some(ping) => {
                if self.check_and_update_ping(idx, ping, true, ctx).is_ok() {
                    self.records[idx].last_ping = Some(ping.clone());
                    self.seen_pings.insert(ping.hash(), ping.clone());
                }
            }
        }

        if ctx.is_own_service_key(&self.records[idx].service_key) {
            self.records[idx].pose_ban_score = -POSE_BAN_MAX_SCORE;
            if self.records[idx].protocol_version != PROTOCOL_VERSION {
                warn!(
                    proto = self.records[idx].protocol_version,
                    "own announcement uses another protocol, re-activate the masternode"
                );
                return false;
            }
            self.own_activation = true;
        }
        true
    }

    /// Install an announcement created by this node.
    pub fn update_masternode_list(&mut self, mnb: Broadcast, ctx: &Context) {
        let now = ctx.now();
        let hash = mnb.hash();
        if let Some(ping) = &mnb.last_ping {
            self.seen_pings.insert(ping.hash(), ping.clone());
        }
        self.seen_broadcasts.insert(
            hash,
            SeenBroadcast {
                seen_at: now,
                broadcast: mnb.clone(),
            },
        );
        info!(addr = %mnb.addr, outpoint = %mnb.outpoint, "updating masternode list from local announcement");

        match self.position(&mnb.outpoint) {
            None => {
                let record = MasternodeRecord::from_broadcast(&mnb, mnb.last_ping.is_some());
                if self.add(record) {
                    ctx.sync.added_list_item();
                }
            }
            Some(idx) => {
                let old_hash = self.records[idx].to_broadcast().hash();
                if self.apply_broadcast(idx, &mnb, ctx) {
                    ctx.sync.added_list_item();
                    if old_hash != hash {
                        self.seen_broadcasts.remove(&old_hash);
                    }
                }
            }
        }
    }

    // ── Pings ───────────────────────────────────────────────────────────

    /// Validate a ping against record `idx` and store it.
    pub(crate) fn check_and_update_ping(
        &mut self,
        idx: usize,
        ping: &Ping,
        from_broadcast: bool,
        ctx: &Context,
    ) -> Result<(), Rejection> {
        let anchor = ping_simple_check(ping, ctx)?;
        let record = &self.records[idx];

        if !from_broadcast {
            match record.state {
                MasternodeState::UpdateRequired => {
                    return Err(Rejection::soft(RejectReason::UpdateRequired))
                }
                MasternodeState::NewStartRequired => {
                    return Err(Rejection::soft(RejectReason::NewStartRequired))
                }
                _ => {}
            }
        }

        let tip = ctx.tip().unwrap_or(0);
        if anchor < tip.saturating_sub(PING_MAX_ANCHOR_AGE) {
            debug!(outpoint = %ping.outpoint, anchor, tip, "ping anchor too old");
            return Err(Rejection::soft(RejectReason::AnchorTooOld));
        }

        if record.is_pinged_within(MIN_MNP_SECONDS - 60, ping.sig_time) {
            debug!(outpoint = %ping.outpoint, "ping arrived too early");
            return Err(Rejection::soft(RejectReason::TooEarly));
        }

        if !ping.verify(&record.service_key) {
            return Err(Rejection::new(33, RejectReason::BadSignature));
        }

        // A node that pings during list sync is alive; keep waiting for the rest.
        if !ctx.sync.is_list_synced() && !record.is_pinged_within(EXPIRATION_SECONDS / 2, ctx.now())
        {
            debug!(outpoint = %ping.outpoint, "ping during list sync");
            ctx.sync.added_list_item();
        }

        let broadcast_hash = record.to_broadcast().hash();
        self.records[idx].last_ping = Some(ping.clone());
        if let Some(seen) = self.seen_broadcasts.get_mut(&broadcast_hash) {
            seen.broadcast.last_ping = Some(ping.clone());
        }

        self.check_record(idx, ctx, true);
        if !self.records[idx].is_enabled() {
            return Err(Rejection::soft(RejectReason::NotEnabled));
        }

        debug!(outpoint = %ping.outpoint, "ping accepted");
        ctx.network.relay(Inventory::Ping(ping.hash()));
        Ok(())
    }

    /// Handle a ping relayed by `peer`.
    pub fn process_ping(&mut self, peer: &PeerInfo, ping: Ping, ctx: &Context) -> Result<(), Rejection> {
        if !ctx.sync.is_blockchain_synced() {
            return Ok(());
        }
        let hash = ping.hash();
        if self.seen_pings.contains_key(&hash) {
            return Ok(());
        }
        self.seen_pings.insert(hash, ping.clone());
        debug!(outpoint = %ping.outpoint, %peer.id, "new ping");

        let idx = self.position(&ping.outpoint);
        if let Some(idx) = idx {
            if self.records[idx].state == MasternodeState::NewStartRequired {
                return Ok(());
            }
        }

        let result = match idx {
            Some(idx) => self.check_and_update_ping(idx, &ping, false, ctx),
            None => ping_simple_check(&ping, ctx)
                .and_then(|_| {
                Err::<(), _>(Rejection::soft(RejectReason::UnknownMasternode(ping.outpoint)))
            }),
        };
        match result {
            Ok(()) => Ok(()),
            // Nothing worth asking about.
            Err(rejection) if rejection.dos == 0 && idx.is_some() => Err(rejection),
            Err(rejection) => {
                self.ask_for_mn(peer, ping.outpoint, ctx);
                Err(rejection)
            }
        }
    }

    // ── List requests ───────────────────────────────────────────────────

    /// Ask `peer` for the announcement of a single collateral.
    pub fn ask_for_mn(&mut self, peer: &PeerInfo, outpoint: Outpoint, ctx: &Context) {
        let now = ctx.now();
        let asked = self.we_asked_for_entry.entry(outpoint).or_default();
        match asked.get(&peer.addr) {
            Some(until) if now < *until => return,
            Some(_) => debug!(%outpoint, %peer.id, "asking same peer for missing masternode again"),
            None => debug!(%outpoint, %peer.id, "asking new peer for missing masternode"),
        }
        asked.insert(peer.addr, now.plus_secs(DSEG_UPDATE_SECONDS));
        ctx.network.send(peer.id, WireMessage::ListRequest(outpoint));
    }

    /// Ask `peer` for the full list, at most once per cooldown on mainnet.
    pub fn dseg_update(&mut self, peer: &PeerInfo, ctx: &Context) {
        let now = ctx.now();
        if ctx.params.network == NetworkId::Main && !is_local_addr(&peer.addr) {
            if let Some(until) = self.we_asked_for_list.get(&peer.addr) {
                if now < *until {
                    debug!(%peer.id, "we already asked this peer for the list, skipping");
                    return;
                }
            }
        }
        ctx.network.send(peer.id, WireMessage::ListRequest(Outpoint::NULL));
        self.we_asked_for_list
            .insert(peer.addr, now.plus_secs(DSEG_UPDATE_SECONDS));
        debug!(%peer.id, "asked peer for the masternode list");
    }

    /// Serve a list request: the full list for `Outpoint::NULL`, else one entry.
    ///
    /// Returns the number of records announced.
    pub fn process_list_request(
        &mut self,
        peer: &PeerInfo,
        request: Outpoint,
        ctx: &Context,
    ) -> Result<usize, Rejection> {
        if !ctx.sync.is_synced() {
            return Ok(0);
        }
        let now = ctx.now();
        let full = request.is_null();
        debug!(%peer.id, outpoint = %request, "list request");

        if full && ctx.params.network == NetworkId::Main && !is_local_addr(&peer.addr) {
            if let Some(until) = self.asked_us_for_list.get(&peer.addr) {
                if now < *until {
                    return Err(Rejection::new(34, RejectReason::ListAlreadyRequested));
                }
            }
            self.asked_us_for_list
                .insert(peer.addr, now.plus_secs(DSEG_UPDATE_SECONDS));
        }

        let mut inventory = Vec::new();
        let mut count = 0;
        for record in &self.records {
            if !full && record.outpoint != request {
                continue;
            }
            if is_local_addr(&record.addr) || record.state == MasternodeState::UpdateRequired {
                continue;
            }
            let mnb = record.to_broadcast();
            let hash = mnb.hash();
            inventory.push(Inventory::Announce(hash));
            if let Some(ping) = &record.last_ping {
                inventory.push(Inventory::Ping(ping.hash()));
                self.seen_pings
                    .entry(ping.hash())
                    .or_insert_with(|| ping.clone());
            }
            count += 1;
            self.seen_broadcasts.entry(hash).or_insert(SeenBroadcast {
                seen_at: now,
                broadcast: mnb,
            });
            if !full {
                break;
            }
        }

        for chunk in inventory.chunks(MAX_INV_SIZE) {
            ctx.network.send(peer.id, WireMessage::Inventory(chunk.to_vec()));
        }

        if full {
            ctx.network.send(
                peer.id,
                WireMessage::SyncStatusCount(SyncStatusCount {
                    item: SyncItem::List,
                    count: count as u32,
                }),
            );
            info!(%peer.id, count, "sent masternode list");
        } else if count == 0 {
            debug!(%peer.id, outpoint = %request, "no entry for requested collateral");
        }
        Ok(count)
    }
}
