//! A single masternode entry and its state machine.

use crate::constants::*;
use crate::context::Context;
use lmnode_crypto::{blake2b_256, blake2b_256_multi, payee_script};
use lmnode_messages::{Broadcast, Ping};
use lmnode_types::{
    abs_diff, u256_from_le, BlockHash, MasternodeState, Outpoint, PublicKey, Script, Signature,
    Timestamp, U256, PROTOCOL_VERSION,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use tracing::debug;

/// Registry-wide facts a record needs to recompute its state.
#[derive(Clone, Copy, Debug)]
pub struct CheckEnv {
    /// Number of records in the registry (ban length).
    pub registry_size: usize,
    /// Whether watchdog votes are being seen network-wide.
    pub watchdog_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeRecord {
    pub outpoint: Outpoint,
    pub addr: SocketAddr,
    pub collateral_key: PublicKey,
    pub service_key: PublicKey,
    /// Signature and time of the announcement that produced the current fields.
    pub signature: Signature,
    pub sig_time: Timestamp,
    pub last_ping: Option<Ping>,
    pub protocol_version: u32,
    pub state: MasternodeState,
    pub pose_ban_score: i32,
    pub pose_ban_height: u32,
    pub last_paid_height: u32,
    pub last_paid_time: Timestamp,
    pub last_watchdog_vote: Timestamp,
    /// Height of the block holding the collateral, cached after the first lookup.
    pub collateral_height: Option<u32>,
    #[serde(skip)]
    pub(crate) last_checked: Timestamp,
}

/// A detached copy of the public fields of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasternodeInfo {
    pub outpoint: Outpoint,
    pub addr: SocketAddr,
    pub collateral_key: PublicKey,
    pub service_key: PublicKey,
    pub sig_time: Timestamp,
    pub last_ping_time: Option<Timestamp>,
    pub last_paid_height: u32,
    pub last_paid_time: Timestamp,
    pub last_watchdog_vote: Timestamp,
    pub state: MasternodeState,
    pub protocol_version: u32,
    pub pose_ban_score: i32,
}

impl MasternodeInfo {
    pub fn payee(&self) -> Script {
        payee_script(&self.collateral_key)
    }
}

impl MasternodeRecord {
    /// A new record from an announcement. `ping_valid` is the outcome of the
    /// announcement's embedded ping check.
    pub fn from_broadcast(mnb: &Broadcast, ping_valid: bool) -> Self {
        Self {
            outpoint: mnb.outpoint,
            addr: mnb.addr,
            collateral_key: mnb.collateral_key.clone(),
            service_key: mnb.service_key.clone(),
            signature: mnb.signature.clone(),
            sig_time: mnb.sig_time,
            last_ping: mnb.last_ping.clone(),
            protocol_version: mnb.protocol_version,
            state: if ping_valid {
                MasternodeState::PreEnabled
            } else {
                MasternodeState::Expired
            },
            pose_ban_score: 0,
            pose_ban_height: 0,
            last_paid_height: 0,
            last_paid_time: Timestamp::EPOCH,
            last_watchdog_vote: mnb.sig_time,
            collateral_height: None,
            last_checked: Timestamp::EPOCH,
        }
    }

    /// Rebuild the announcement this record was created or last updated from.
    pub fn to_broadcast(&self) -> Broadcast {
        let mut mnb = Broadcast::new(
            self.outpoint,
            self.addr,
            self.collateral_key.clone(),
            self.service_key.clone(),
            self.protocol_version,
            self.sig_time,
        );
        mnb.signature = self.signature.clone();
        mnb.last_ping = self.last_ping.clone();
        mnb
    }

    pub fn info(&self) -> MasternodeInfo {
        MasternodeInfo {
            outpoint: self.outpoint,
            addr: self.addr,
            collateral_key: self.collateral_key.clone(),
            service_key: self.service_key.clone(),
            sig_time: self.sig_time,
            last_ping_time: self.last_ping.as_ref().map(|p| p.sig_time),
            last_paid_height: self.last_paid_height,
            last_paid_time: self.last_paid_time,
            last_watchdog_vote: self.last_watchdog_vote,
            state: self.state,
            protocol_version: self.protocol_version,
            pose_ban_score: self.pose_ban_score,
        }
    }

    pub fn payee(&self) -> Script {
        payee_script(&self.collateral_key)
    }

    // ── State predicates ────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.state == MasternodeState::Enabled
    }

    pub fn is_pre_enabled(&self) -> bool {
        self.state == MasternodeState::PreEnabled
    }

    pub fn is_pose_banned(&self) -> bool {
        self.state == MasternodeState::PoseBan
    }

    /// A node that answered enough challenges to reach the score floor.
    pub fn is_pose_verified(&self) -> bool {
        self.pose_ban_score <= -POSE_BAN_MAX_SCORE
    }

    pub fn is_valid_for_payment(&self) -> bool {
        self.state.is_valid_for_payment()
    }

    /// Whether the last ping is less than `seconds` away from `at`.
    pub fn is_pinged_within(&self, seconds: u64, at: Timestamp) -> bool {
        self.last_ping
            .as_ref()
            .is_some_and(|p| p.sig_time.as_secs().abs_diff(at.as_secs()) < seconds)
    }

    pub fn is_broadcasted_within(&self, seconds: u64, now: Timestamp) -> bool {
        self.sig_time.elapsed_since(now) < seconds
    }

    // ── Proof-of-service score ──────────────────────────────────────────

    pub fn increase_pose_ban_score(&mut self) {
        if self.pose_ban_score < POSE_BAN_MAX_SCORE {
            self.pose_ban_score += 1;
        }
    }

    pub fn decrease_pose_ban_score(&mut self) {
        if self.pose_ban_score > -POSE_BAN_MAX_SCORE {
            self.pose_ban_score -= 1;
        }
    }

    pub fn pose_ban(&mut self) {
        self.pose_ban_score = POSE_BAN_MAX_SCORE;
    }

    // ── Scoring ─────────────────────────────────────────────────────────

    /// `|H(seed) − H(seed ‖ txid + index)|` as a 256-bit integer.
    pub fn score(&self, seed: &BlockHash) -> U256 {
        let aux = self.outpoint.score_salt();
        let plain = u256_from_le(&blake2b_256(seed.as_bytes()));
        let salted = u256_from_le(&blake2b_256_multi(&[seed.as_bytes(), &aux]));
        abs_diff(plain, salted)
    }

    /// Confirmations of the collateral, or `None` if it cannot be looked up.
    pub fn collateral_age(&mut self, ctx: &Context) -> Option<u32> {
        let tip = ctx.tip()?;
        if self.collateral_height.is_none() {
            let utxo = ctx.chain.utxo(&self.outpoint).ok().flatten()?;
            self.collateral_height = Some(utxo.height);
        }
        self.collateral_height
            .map(|h| tip.saturating_add(1).saturating_sub(h))
    }

    // ── State machine ───────────────────────────────────────────────────

    /// Recompute the activity state. Rate limited to once per
    /// [`CHECK_SECONDS`] unless `force` is set.
    pub fn check(&mut self, ctx: &Context, env: CheckEnv, force: bool) {
        let now = ctx.now();
        if !force
            && !self.last_checked.is_epoch()
            && self.last_checked.elapsed_since(now) < CHECK_SECONDS
        {
            return;
        }
        self.last_checked = now;

        if self.state == MasternodeState::OutpointSpent {
            return;
        }

        match ctx.chain.utxo(&self.outpoint) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.set_state(MasternodeState::OutpointSpent);
                return;
            }
            // Chain busy: try again next time.
            Err(_) => return,
        }
        let height = ctx.tip().unwrap_or(0);

        if self.is_pose_banned() {
            if height < self.pose_ban_height {
                return;
            }
            debug!(outpoint = %self.outpoint, "masternode is unbanned and back in the list");
            self.decrease_pose_ban_score();
        } else if self.pose_ban_score >= POSE_BAN_MAX_SCORE {
            self.set_state(MasternodeState::PoseBan);
            self.pose_ban_height = height.saturating_add(env.registry_size as u32);
            debug!(outpoint = %self.outpoint, until = self.pose_ban_height, "masternode banned");
            return;
        }

        let ours = ctx.is_own_service_key(&self.service_key);
        let require_update = self.protocol_version < ctx.min_payments_proto()
            || (ours && self.protocol_version < PROTOCOL_VERSION);
        if require_update {
            self.set_state(MasternodeState::UpdateRequired);
            return;
        }

        // Old entries get a chance to receive a ping while the list is syncing.
        let wait_for_ping =
            !ctx.sync.is_list_synced() && !self.is_pinged_within(MIN_MNP_SECONDS, now);

        // ...unless they were already expired before the list sync started.
        if wait_for_ping
            && !ours
            && matches!(
                self.state,
                MasternodeState::Expired
                    | MasternodeState::WatchdogExpired
                    | MasternodeState::NewStartRequired
            )
        {
            return;
        }

        if !wait_for_ping || ours {
            if !self.is_pinged_within(NEW_START_REQUIRED_SECONDS, now) {
                self.set_state(MasternodeState::NewStartRequired);
                return;
            }
            let watchdog_expired = env.watchdog_active
                && self.last_watchdog_vote.elapsed_since(now) > WATCHDOG_MAX_SECONDS;
            if watchdog_expired {
                self.set_state(MasternodeState::WatchdogExpired);
                return;
            }
            if !self.is_pinged_within(EXPIRATION_SECONDS, now) {
                self.set_state(MasternodeState::Expired);
                return;
            }
        }

        let ping_time = self.last_ping.as_ref().map_or(0, |p| p.sig_time.as_secs());
        if (ping_time as i64 - self.sig_time.as_secs() as i64) < MIN_MNP_SECONDS as i64 {
            self.set_state(MasternodeState::PreEnabled);
            return;
        }

        self.set_state(MasternodeState::Enabled);
    }

    fn set_state(&mut self, state: MasternodeState) {
        if self.state != state {
            debug!(outpoint = %self.outpoint, from = %self.state, to = %state, "masternode state changed");
            self.state = state;
        }
    }
}

impl fmt::Display for MasternodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ping_time, ping_age) = match &self.last_ping {
            Some(p) => (
                p.sig_time.as_secs(),
                p.sig_time.as_secs().saturating_sub(self.sig_time.as_secs()),
            ),
            None => (self.sig_time.as_secs(), 0),
        };
        write!(
            f,
            "lmnode{{{} {} {} {} {} {} {}}}",
            self.addr,
            self.protocol_version,
            self.outpoint,
            self.payee(),
            ping_time,
            ping_age,
            self.last_paid_height
        )
    }
}
