//! Payment queue and deterministic ranking.
//!
//! Scores are `|H(seed) − H(seed ‖ collateral)|` over the block hash at the
//! relevant height. Ranks compare the compact encoding of the score so that
//! every node orders the registry the same way.

use crate::constants::*;
use crate::context::Context;
use crate::record::{MasternodeInfo, MasternodeRecord};
use crate::registry::Registry;
use crate::schedule::PaymentSchedule;
use lmnode_types::{Outpoint, Timestamp, ToCompact, U256};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a record is left out of the payment queue.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NotQualified {
    #[error("not valid for payment")]
    NotValidForPayment,

    #[error("protocol {0} is below the payment minimum")]
    OutdatedProtocol(u32),

    #[error("already scheduled for payment")]
    Scheduled,

    #[error("announced too recently, qualifies at {0}")]
    TooNew(Timestamp),

    #[error("collateral age {age:?} is below the enabled count {count}")]
    CollateralTooYoung { age: Option<u32>, count: usize },
}

impl Registry {
    fn not_qualified_reason(
        &mut self,
        idx: usize,
        height: u32,
        filter_sig_time: bool,
        enabled: usize,
        ctx: &Context,
        schedule: &dyn PaymentSchedule,
    ) -> Option<NotQualified> {
        let tip = ctx.tip().unwrap_or(0);
        let min_proto = ctx.min_payments_proto();
        let record = &mut self.records[idx];

        if !record.is_valid_for_payment() {
            return Some(NotQualified::NotValidForPayment);
        }
        if record.protocol_version < min_proto {
            return Some(NotQualified::OutdatedProtocol(record.protocol_version));
        }
        if schedule.is_scheduled(&record.payee(), height, tip) {
            return Some(NotQualified::Scheduled);
        }
        if filter_sig_time {
            let qualifies_at = record
                .sig_time
                .plus_secs(enabled as u64 * QUEUE_SECONDS_PER_NODE);
            if qualifies_at > ctx.now() {
                return Some(NotQualified::TooNew(qualifies_at));
            }
        }
        let age = record.collateral_age(ctx);
        if age.map_or(true, |a| (a as usize) < enabled) {
            return Some(NotQualified::CollateralTooYoung {
                age,
                count: enabled,
            });
        }
        None
    }

    /// The masternode that should be paid at `height`, and how many qualified.
    ///
    /// Candidates are the least recently paid tenth of the enabled set; among
    /// them the highest score at `height − 101` wins.
    pub fn next_in_queue(
        &mut self,
        height: u32,
        filter_sig_time: bool,
        ctx: &Context,
        schedule: &dyn PaymentSchedule,
    ) -> (Option<MasternodeInfo>, usize) {
        let enabled = self.count_enabled(ctx.min_payments_proto());

        let mut candidates: Vec<(u32, Outpoint, usize)> = Vec::new();
        for idx in 0..self.records.len() {
            match self.not_qualified_reason(idx, height, filter_sig_time, enabled, ctx, schedule) {
                Some(reason) => {
                    debug!(outpoint = %self.records[idx].outpoint, %reason, "not qualified for payment")
                }
                None => {
                    let r = &self.records[idx];
                    candidates.push((r.last_paid_height, r.outpoint, idx));
                }
            }
        }
        let count = candidates.len();

        // Too many fresh nodes would stall the queue: retry without the age filter.
        if filter_sig_time && count < enabled / 3 {
            return self.next_in_queue(height, false, ctx, schedule);
        }

        candidates.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let Some(seed) = height
            .checked_sub(SCORE_SEED_OFFSET)
            .and_then(|h| ctx.chain.block_hash(h))
        else {
            warn!(height, "no score seed block for payment queue");
            return (None, count);
        };

        let tenth = (enabled / 10).max(1);
        let mut highest = U256::zero();
        let mut best = None;
        for (counted, (_, _, idx)) in candidates.iter().enumerate() {
            let score = self.records[*idx].score(&seed);
            if score > highest {
                highest = score;
                best = Some(*idx);
            }
            if counted + 1 >= tenth {
                break;
            }
        }
        (best.map(|idx| self.records[idx].info()), count)
    }

    /// Records passing `filter`, sorted by descending compact score at `height`.
    fn scored(
        &self,
        height: u32,
        min_proto: u32,
        filter: impl Fn(&MasternodeRecord) -> bool,
        ctx: &Context,
    ) -> Option<Vec<usize>> {
        let Some(seed) = ctx.chain.block_hash(height) else {
            debug!(height, "cannot rank without a block hash");
            return None;
        };
        let mut scores: Vec<(u32, Outpoint, usize)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.protocol_version >= min_proto && filter(r))
            .map(|(idx, r)| (r.score(&seed).to_compact(), r.outpoint, idx))
            .collect();
        scores.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Some(scores.into_iter().map(|(_, _, idx)| idx).collect())
    }

    /// 1-based rank of `outpoint` at `height`.
    pub fn get_rank(
        &self,
        outpoint: &Outpoint,
        height: u32,
        min_proto: u32,
        only_active: bool,
        ctx: &Context,
    ) -> Option<u32> {
        let ranked = self.scored(
            height,
            min_proto,
            |r| {
                if only_active {
                    r.is_enabled()
                } else {
                    r.is_valid_for_payment()
                }
            },
            ctx,
        )?;
        ranked
            .iter()
            .position(|idx| &self.records[*idx].outpoint == outpoint)
            .map(|pos| pos as u32 + 1)
    }

    /// Every enabled record with its rank at `height`, best first.
    pub fn get_ranks(&self, height: u32, min_proto: u32, ctx: &Context) -> Vec<(u32, MasternodeInfo)> {
        self.scored(height, min_proto, MasternodeRecord::is_enabled, ctx)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(pos, idx)| (pos as u32 + 1, self.records[idx].info()))
            .collect()
    }

    pub fn get_by_rank(
        &self,
        rank: u32,
        height: u32,
        min_proto: u32,
        only_active: bool,
        ctx: &Context,
    ) -> Option<MasternodeInfo> {
        let ranked = self.scored(
            height,
            min_proto,
            |r| !only_active || r.is_enabled(),
            ctx,
        )?;
        let pos = usize::try_from(rank).ok()?.checked_sub(1)?;
        ranked.get(pos).map(|idx| self.records[*idx].info())
    }
}
