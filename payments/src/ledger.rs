//! The payment ledger: every known vote and the payee sets built from them.

use crate::constants::*;
use crate::error::PaymentError;
use crate::payee::BlockPayees;
use lmnode_messages::{Inventory, ObjectHash, PaymentVote};
use lmnode_registry::constants::{storage_limit, SCORE_SEED_OFFSET};
use lmnode_registry::{Context, PaymentSchedule};
use lmnode_types::{Outpoint, Script};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};

/// Version tag written in front of every ledger snapshot.
pub const PAYMENTS_SNAPSHOT_VERSION: &str = "LMNodePayments-Version-2";

/// A vote as first seen on the wire. Only verified votes count or are served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVote {
    pub vote: PaymentVote,
    pub verified: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PaymentLedger {
    pub(crate) votes: HashMap<ObjectHash, StoredVote>,
    pub(crate) blocks: BTreeMap<u32, BlockPayees>,
    #[serde(skip)]
    pub(crate) last_vote: HashMap<Outpoint, u32>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
        self.blocks.clear();
    }

    /// Record that `voter` votes at `height`. At most one vote per height.
    pub fn can_vote(&mut self, voter: Outpoint, height: u32) -> bool {
        if self.last_vote.get(&voter) == Some(&height) {
            return false;
        }
        self.last_vote.insert(voter, height);
        true
    }

    /// Count a vote into its block. Requires the score seed block to exist.
    pub fn add_payment_vote(&mut self, vote: PaymentVote, ctx: &Context) -> bool {
        let seeded = vote
            .height
            .checked_sub(SCORE_SEED_OFFSET)
            .and_then(|h| ctx.chain.block_hash(h))
            .is_some();
        if !seeded {
            return false;
        }
        let hash = vote.hash();
        if self.has_verified_vote(&hash) {
            return false;
        }
        let added = self
            .blocks
            .entry(vote.height)
            .or_insert_with(|| BlockPayees::new(vote.height))
            .add_payee(vote.voter, &vote.payee, hash);
        if !added {
            debug!(voter = %vote.voter, height = vote.height, "voter already counted at this height");
            return false;
        }
        self.votes.insert(
            hash,
            StoredVote {
                vote,
                verified: true,
            },
        );
        true
    }

    /// Whether the vote is stored, verified or not.
    pub fn has_vote(&self, hash: &ObjectHash) -> bool {
        self.votes.contains_key(hash)
    }

    pub fn has_verified_vote(&self, hash: &ObjectHash) -> bool {
        self.votes.get(hash).is_some_and(|v| v.verified)
    }

    /// A verified vote by hash.
    pub fn get_vote(&self, hash: &ObjectHash) -> Option<&PaymentVote> {
        self.votes
            .get(hash)
            .filter(|v| v.verified)
            .map(|v| &v.vote)
    }

    /// Every verified vote counted at `height`.
    pub fn get_block_votes(&self, height: u32) -> Vec<PaymentVote> {
        let Some(block) = self.blocks.get(&height) else {
            return Vec::new();
        };
        block
            .payees()
            .iter()
            .flat_map(|p| p.votes.iter())
            .filter_map(|hash| self.get_vote(hash).cloned())
            .collect()
    }

    pub fn block_payees(&self, height: u32) -> Option<&BlockPayees> {
        self.blocks.get(&height)
    }

    pub fn get_block_payee(&self, height: u32) -> Option<Script> {
        self.blocks.get(&height)?.best_payee().cloned()
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks of votes kept: `max(registry_size × 1.25, 5000)`.
    pub fn storage_limit(&self, registry_size: usize) -> u32 {
        storage_limit(registry_size)
    }

    pub fn is_enough_data(&self, registry_size: usize) -> bool {
        let limit = self.storage_limit(registry_size) as usize;
        self.block_count() > limit && self.vote_count() > limit * AVERAGE_VOTES
    }

    /// Drop votes and blocks older than the storage limit.
    pub fn check_and_remove(&mut self, registry_size: usize, ctx: &Context) {
        let Some(tip) = ctx.tip() else {
            return;
        };
        let limit = self.storage_limit(registry_size);
        let fresh = |height: u32| tip.saturating_sub(height) <= limit;

        self.votes.retain(|hash, stored| {
            let keep = fresh(stored.vote.height);
            if !keep {
                debug!(%hash, height = stored.vote.height, "removing old payment vote");
            }
            keep
        });
        self.blocks.retain(|height, _| fresh(*height));
        self.last_vote.retain(|_, height| fresh(*height));
        info!("{self}");
    }

    /// Relay a vote once the winners list is synced.
    pub(crate) fn relay(&self, vote: &PaymentVote, ctx: &Context) {
        if !ctx.sync.is_winners_list_synced() {
            debug!(hash = %vote.hash(), "winners list not synced, not relaying vote");
            return;
        }
        ctx.network.relay(Inventory::PaymentVote(vote.hash()));
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn serialize(&self) -> Result<Vec<u8>, PaymentError> {
        bincode::serialize(&(PAYMENTS_SNAPSHOT_VERSION, self))
            .map_err(|e| PaymentError::Encode(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, PaymentError> {
        let version: String =
            bincode::deserialize(bytes).map_err(|e| PaymentError::Decode(e.to_string()))?;
        if version != PAYMENTS_SNAPSHOT_VERSION {
            return Err(PaymentError::VersionMismatch {
                expected: PAYMENTS_SNAPSHOT_VERSION.to_string(),
                found: version,
            });
        }
        let (_, ledger): (String, PaymentLedger) =
            bincode::deserialize(bytes).map_err(|e| PaymentError::Decode(e.to_string()))?;
        Ok(ledger)
    }
}

impl PaymentSchedule for PaymentLedger {
    fn is_scheduled(&self, payee: &Script, not_height: u32, tip: u32) -> bool {
        (tip..=tip.saturating_add(SCHEDULE_LOOKAHEAD))
            .filter(|h| *h != not_height)
            .any(|h| self.get_block_payee(h).as_ref() == Some(payee))
    }

    fn has_payee_with_votes(&self, height: u32, payee: &Script, min_votes: usize) -> bool {
        self.blocks
            .get(&height)
            .is_some_and(|b| b.has_payee_with_votes(payee, min_votes))
    }
}

impl fmt::Display for PaymentLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Votes: {}, Blocks: {}", self.vote_count(), self.block_count())
    }
}
