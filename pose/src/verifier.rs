//! Challenge, reply and broadcast handling for proof-of-service.
//!
//! A top ranked masternode connects to a masternode's announced address and
//! asks it to sign a nonce with its service key. Whoever answers proves the
//! address belongs to that record; every other record claiming the same
//! address earns ban score. The challenger countersigns and relays the
//! result so the rest of the network can apply the same scores.

use crate::constants::*;
use crate::error::{PoseError, PoseRejectReason, PoseRejection};
use lmnode_messages::{Inventory, ObjectHash, Verification, VerificationPhase, WireMessage};
use lmnode_network::{PeerInfo, RequestTag};
use lmnode_registry::{Context, Registry};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct PoseVerifier {
    /// Outstanding challenges, and our countersigned result once answered.
    we_asked: HashMap<SocketAddr, Verification>,
    /// Broadcasts seen from the network or produced by us.
    seen: HashMap<ObjectHash, Verification>,
}

impl PoseVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.we_asked.clear();
        self.seen.clear();
    }

    pub fn asked_count(&self) -> usize {
        self.we_asked.len()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn get_verification(&self, hash: &ObjectHash) -> Option<Verification> {
        self.seen.get(hash).cloned()
    }

    pub fn has_seen(&self, hash: &ObjectHash) -> bool {
        self.seen.contains_key(hash)
    }

    /// Route a verification message by its phase.
    pub fn process_verify(
        &mut self,
        peer: &PeerInfo,
        mnv: Verification,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Result<(), PoseRejection> {
        match mnv.phase() {
            VerificationPhase::Request => self.send_verify_reply(peer, mnv, ctx),
            VerificationPhase::Reply => self.process_verify_reply(peer, mnv, registry, ctx),
            VerificationPhase::Broadcast => {
                self.process_verify_broadcast(peer, mnv, registry, ctx)
            }
        }
    }

    // ── Challenger side ─────────────────────────────────────────────────

    /// Challenge whoever runs at `addr`.
    pub fn send_verify_request(&mut self, addr: SocketAddr, ctx: &Context) -> Result<(), PoseError> {
        let now = ctx.now();
        if ctx.fulfilled.has(&addr, RequestTag::VerifyRequest, now) {
            debug!(%addr, "already challenged, skipping");
            return Err(PoseError::AlreadyRequested(addr));
        }
        let tip = ctx.tip().ok_or(PoseError::NoTip)?;
        let peer = ctx.network.connect_masternode(addr).map_err(|source| {
            warn!(%addr, error = %source, "can't connect to node to verify it");
            PoseError::Connect { addr, source }
        })?;

        ctx.fulfilled.add(&addr, RequestTag::VerifyRequest, now);
        let mnv = Verification::request(addr, ctx.random.below(NONCE_RANGE), tip.saturating_sub(1));
        info!(nonce = mnv.nonce, %addr, "verifying node");
        self.we_asked.insert(addr, mnv.clone());
        ctx.network.send(peer, WireMessage::Verify(mnv));
        Ok(())
    }

    /// Check a reply to one of our challenges and score every record at the
    /// challenged address.
    pub fn process_verify_reply(
        &mut self,
        peer: &PeerInfo,
        mut mnv: Verification,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Result<(), PoseRejection> {
        let now = ctx.now();
        let asked = match self.we_asked.get(&peer.addr) {
            Some(asked) if ctx.fulfilled.has(&peer.addr, RequestTag::VerifyRequest, now) => asked,
            _ => {
                return Err(PoseRejection::new(
                    20,
                    PoseRejectReason::NotRequested(peer.addr),
                ))
            }
        };
        if asked.nonce != mnv.nonce {
            return Err(PoseRejection::new(
                20,
                PoseRejectReason::WrongNonce {
                    requested: asked.nonce,
                    received: mnv.nonce,
                },
            ));
        }
        if asked.height != mnv.height {
            return Err(PoseRejection::new(
                20,
                PoseRejectReason::WrongHeight {
                    requested: asked.height,
                    received: mnv.height,
                },
            ));
        }
        let Some(block_hash) = ctx.chain.block_hash(mnv.height) else {
            return Err(PoseRejection::soft(PoseRejectReason::UnknownBlock(mnv.height)));
        };
        if ctx.fulfilled.has(&peer.addr, RequestTag::VerifyDone, now) {
            return Err(PoseRejection::new(
                20,
                PoseRejectReason::AlreadyVerified(peer.addr),
            ));
        }

        // The reply must be signed over the address we connected to.
        mnv.addr = peer.addr;
        let (real, fake): (Vec<usize>, Vec<usize>) = registry
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.addr == peer.addr)
            .map(|(idx, r)| (idx, mnv.verify_reply(&block_hash, &r.service_key)))
            .fold((Vec::new(), Vec::new()), |(mut real, mut fake), (idx, ok)| {
                if ok {
                    real.push(idx);
                } else {
                    fake.push(idx);
                }
                (real, fake)
            });
        let Some(&proved) = real.first() else {
            return Err(PoseRejection::new(
                20,
                PoseRejectReason::NoRealMasternode(peer.addr),
            ));
        };
        ctx.fulfilled.add(&peer.addr, RequestTag::VerifyDone, now);

        let records = registry.records_mut();
        for &idx in &real {
            if !records[idx].is_pose_verified() {
                records[idx].decrease_pose_ban_score();
            }
        }
        info!(masternode = %records[proved].outpoint, addr = %peer.addr, "verified real masternode");
        for &idx in &fake {
            records[idx].increase_pose_ban_score();
            debug!(
                masternode = %records[idx].outpoint,
                score = records[idx].pose_ban_score,
                "increased PoSe ban score"
            );
        }
        if !fake.is_empty() {
            info!(count = fake.len(), addr = %peer.addr, "PoSe score increased for fake masternodes");
        }

        // Only an activated masternode can vouch for the result.
        let (Some(local), Some(challenger)) = (ctx.local.as_ref(), ctx.active_outpoint()) else {
            return Ok(());
        };
        mnv.addr = records[proved].addr;
        mnv.vin1 = records[proved].outpoint;
        mnv.vin2 = challenger;
        mnv.sign_broadcast(&block_hash, &local.service_key.private);

        let hash = mnv.hash();
        self.we_asked.insert(peer.addr, mnv.clone());
        self.seen.insert(hash, mnv);
        ctx.network.relay(Inventory::Verify(hash));
        Ok(())
    }

    /// Challenge up to `MAX_POSE_CONNECTIONS` masternodes further down the
    /// ranking. Returns the number of challenges sent.
    pub fn do_full_verification_step(&mut self, registry: &Registry, ctx: &Context) -> usize {
        let Some(me) = ctx.active_outpoint() else {
            return 0;
        };
        if !ctx.sync.is_synced() {
            return 0;
        }
        let Some(tip) = ctx.tip() else {
            return 0;
        };
        let ranks = registry.get_ranks(tip.saturating_sub(1), MIN_POSE_PROTO_VERSION, ctx);
        let total = ranks.len();

        let mut my_rank = None;
        for (rank, info) in &ranks {
            if *rank > MAX_POSE_RANK {
                debug!("must be in the top {MAX_POSE_RANK} to send verify requests");
                return 0;
            }
            if info.outpoint == me {
                my_rank = Some(*rank);
                break;
            }
        }
        // The list is short and we are not enabled.
        let Some(my_rank) = my_rank else {
            return 0;
        };
        debug!(my_rank, total, "found self, verifying up to {MAX_POSE_CONNECTIONS} masternodes");

        // Each top node starts at its own offset so the challenged sets do not overlap.
        let offset = (MAX_POSE_RANK + my_rank - 1) as usize;
        let mut sent = 0;
        for (rank, info) in ranks.iter().skip(offset).step_by(MAX_POSE_CONNECTIONS) {
            let settled = registry
                .find(&info.outpoint)
                .is_some_and(|r| r.is_pose_verified() || r.is_pose_banned());
            if settled {
                debug!(masternode = %info.outpoint, addr = %info.addr, "already verified or banned, skipping");
                continue;
            }
            debug!(masternode = %info.outpoint, rank, total, addr = %info.addr, "verifying masternode");
            if self.send_verify_request(info.addr, ctx).is_ok() {
                sent += 1;
                if sent >= MAX_POSE_CONNECTIONS {
                    break;
                }
            }
        }
        debug!(sent, "sent verification requests");
        sent
    }

    // ── Challenged side ─────────────────────────────────────────────────

    /// Sign a challenge addressed to us.
    pub fn send_verify_reply(
        &self,
        peer: &PeerInfo,
        mut mnv: Verification,
        ctx: &Context,
    ) -> Result<(), PoseRejection> {
        // A regular node has nothing to prove. Not scored: someone may be
        // using our address to confuse the challenger.
        let Some(local) = ctx.local.as_ref() else {
            return Ok(());
        };
        let Some(service) = local.addr else {
            return Ok(());
        };
        let now = ctx.now();
        if ctx.fulfilled.has(&peer.addr, RequestTag::VerifyReply, now) {
            return Err(PoseRejection::new(20, PoseRejectReason::ReplyAlreadySent));
        }
        let Some(block_hash) = ctx.chain.block_hash(mnv.height) else {
            return Err(PoseRejection::soft(PoseRejectReason::UnknownBlock(mnv.height)));
        };

        mnv.addr = service;
        mnv.sign_reply(&block_hash, &local.service_key.private);
        debug!(%peer.id, nonce = mnv.nonce, "answering verify request");
        ctx.network.send(peer.id, WireMessage::Verify(mnv));
        ctx.fulfilled.add(&peer.addr, RequestTag::VerifyReply, now);
        Ok(())
    }

    // ── Observers ───────────────────────────────────────────────────────

    /// Apply a countersigned verification relayed by the network.
    pub fn process_verify_broadcast(
        &mut self,
        peer: &PeerInfo,
        mnv: Verification,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Result<(), PoseRejection> {
        let hash = mnv.hash();
        if self.seen.contains_key(&hash) {
            return Ok(());
        }
        self.seen.insert(hash, mnv.clone());

        let Some(tip) = ctx.tip() else {
            return Ok(());
        };
        let oldest = tip.saturating_sub(MAX_POSE_BLOCKS);
        if mnv.height < oldest {
            return Err(PoseRejection::soft(PoseRejectReason::Outdated {
                height: mnv.height,
                oldest,
            }));
        }
        if mnv.vin1 == mnv.vin2 {
            return Err(PoseRejection::new(
                100,
                PoseRejectReason::SelfVerification(mnv.vin1),
            ));
        }
        let Some(block_hash) = ctx.chain.block_hash(mnv.height) else {
            return Err(PoseRejection::soft(PoseRejectReason::UnknownBlock(mnv.height)));
        };

        let rank = registry
            .get_rank(&mnv.vin2, mnv.height, MIN_POSE_PROTO_VERSION, true, ctx)
            .ok_or_else(|| PoseRejection::soft(PoseRejectReason::Unrankable(mnv.vin2)))?;
        if rank > MAX_POSE_RANK {
            return Err(PoseRejection::soft(PoseRejectReason::NotInTop {
                rank,
                top: MAX_POSE_RANK,
            }));
        }

        let proved = registry
            .find(&mnv.vin1)
            .ok_or_else(|| PoseRejection::soft(PoseRejectReason::UnknownMasternode(mnv.vin1)))?;
        let challenger = registry
            .find(&mnv.vin2)
            .ok_or_else(|| PoseRejection::soft(PoseRejectReason::UnknownMasternode(mnv.vin2)))?;
        if proved.addr != mnv.addr {
            return Err(PoseRejection::soft(PoseRejectReason::AddressMismatch {
                claimed: mnv.addr,
                actual: proved.addr,
            }));
        }
        if !mnv.verify_reply(&block_hash, &proved.service_key) {
            return Err(PoseRejection::new(20, PoseRejectReason::BadSignature(mnv.vin1)));
        }
        if !mnv.verify_broadcast(&block_hash, &challenger.service_key) {
            return Err(PoseRejection::new(20, PoseRejectReason::BadSignature(mnv.vin2)));
        }

        registry.with_record_mut(&mnv.vin1, |r| {
            if !r.is_pose_verified() {
                r.decrease_pose_ban_score();
            }
        });
        ctx.network.relay(Inventory::Verify(hash));
        info!(masternode = %mnv.vin1, addr = %mnv.addr, %peer.id, "verified masternode");

        let mut count = 0;
        for record in registry.records_mut() {
            if record.addr != mnv.addr || record.outpoint == mnv.vin1 {
                continue;
            }
            record.increase_pose_ban_score();
            count += 1;
            debug!(masternode = %record.outpoint, score = record.pose_ban_score, "increased PoSe ban score");
        }
        if count > 0 {
            info!(count, addr = %mnv.addr, "PoSe score increased for fake masternodes");
        }
        Ok(())
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Where several (pre-)enabled masternodes share an address and at least
    /// one of them is verified, the first verified one in collateral order
    /// keeps the address and every other record there is scored, verified
    /// or not. Returns how many were scored.
    pub fn check_same_addr(&self, registry: &mut Registry, ctx: &Context) -> usize {
        if !ctx.sync.is_synced() || registry.is_empty() {
            return 0;
        }
        let mut by_addr: BTreeMap<SocketAddr, Vec<usize>> = BTreeMap::new();
        for (idx, record) in registry.records().iter().enumerate() {
            if record.is_enabled() || record.is_pre_enabled() {
                by_addr.entry(record.addr).or_default().push(idx);
            }
        }

        let records = registry.records_mut();
        let mut ban = Vec::new();
        for mut group in by_addr.into_values().filter(|group| group.len() > 1) {
            group.sort_by_key(|&i| records[i].outpoint);
            let Some(keeper) = group.iter().copied().find(|&i| records[i].is_pose_verified()) else {
                continue;
            };
            ban.extend(group.into_iter().filter(|&i| i != keeper));
        }
        for &idx in &ban {
            info!(masternode = %records[idx].outpoint, addr = %records[idx].addr, "increasing PoSe ban score for duplicate address");
            records[idx].increase_pose_ban_score();
        }
        ban.len()
    }

    /// Forget challenges and broadcasts older than `MAX_POSE_BLOCKS`.
    pub fn check_and_remove(&mut self, ctx: &Context) {
        let Some(tip) = ctx.tip() else {
            return;
        };
        let cutoff = tip.saturating_sub(MAX_POSE_BLOCKS);
        self.we_asked.retain(|addr, mnv| {
            let keep = mnv.height >= cutoff;
            if !keep {
                debug!(%addr, "removing expired verification request");
            }
            keep
        });
        self.seen.retain(|hash, mnv| {
            let keep = mnv.height >= cutoff;
            if !keep {
                debug!(%hash, "removing expired verification");
            }
            keep
        });
        debug!(verifier = %self, "PoSe verifier after cleanup");
    }
}

impl fmt::Display for PoseVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Asked: {}, seen: {}",
            self.we_asked.len(),
            self.seen.len()
        )
    }
}
