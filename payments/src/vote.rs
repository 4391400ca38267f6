//! Inbound payment votes and our own voting.

use crate::constants::*;
use crate::error::{PaymentRejectReason, PaymentRejection};
use crate::ledger::{PaymentLedger, StoredVote};
use lmnode_messages::PaymentVote;
use lmnode_network::PeerInfo;
use lmnode_registry::constants::{MIN_PAYMENTS_PROTO_1, SCORE_SEED_OFFSET};
use lmnode_registry::{Context, Registry};
use tracing::{debug, info, warn};

impl PaymentLedger {
    /// Handle a payment vote relayed by `peer`.
    ///
    /// Every vote is remembered by hash on first sight so it is never
    /// processed twice; only votes that pass every check are counted.
    pub fn process_payment_vote(
        &mut self,
        peer: &PeerInfo,
        vote: PaymentVote,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Result<(), PaymentRejection> {
        if !ctx.sync.is_list_synced() {
            return Ok(());
        }
        if peer.version < ctx.min_payments_proto() {
            return Err(PaymentRejection::soft(PaymentRejectReason::PeerProtocol(
                peer.version,
            )));
        }
        let Some(tip) = ctx.tip() else {
            return Ok(());
        };

        let hash = vote.hash();
        if self.votes.contains_key(&hash) {
            debug!(%hash, tip, "payment vote already seen");
            return Ok(());
        }
        self.votes.insert(
            hash,
            StoredVote {
                vote: vote.clone(),
                verified: false,
            },
        );

        let first = tip.saturating_sub(self.storage_limit(registry.size()));
        let last = tip.saturating_add(VOTE_FUTURE_WINDOW);
        if vote.height < first || vote.height > last {
            return Err(PaymentRejection::soft(PaymentRejectReason::OutOfRange {
                height: vote.height,
                first,
                last,
            }));
        }

        self.validate_vote(peer, &vote, tip, registry, ctx)?;

        if !self.can_vote(vote.voter, vote.height) {
            info!(voter = %vote.voter, height = vote.height, "masternode already voted");
            return Err(PaymentRejection::soft(PaymentRejectReason::AlreadyVoted {
                voter: vote.voter,
                height: vote.height,
            }));
        }

        let Some(info) = registry.get_info(&vote.voter) else {
            registry.ask_for_mn(peer, vote.voter, ctx);
            return Err(PaymentRejection::soft(PaymentRejectReason::UnknownVoter(
                vote.voter,
            )));
        };
        if !vote.verify(&info.service_key) {
            // Our copy of the voter may be outdated.
            registry.ask_for_mn(peer, vote.voter, ctx);
            let dos = if ctx.sync.is_list_synced() && vote.height > tip {
                20
            } else {
                0
            };
            return Err(PaymentRejection::new(dos, PaymentRejectReason::BadSignature));
        }

        debug!(payee = %vote.payee, height = vote.height, tip, voter = %vote.voter, "payment vote");
        if self.add_payment_vote(vote.clone(), ctx) {
            self.relay(&vote, ctx);
            ctx.sync.added_payment_vote();
        }
        Ok(())
    }

    /// Voter known, recent enough protocol, and ranked among the voters of
    /// the block.
    fn validate_vote(
        &self,
        peer: &PeerInfo,
        vote: &PaymentVote,
        tip: u32,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Result<(), PaymentRejection> {
        let Some(protocol_version) = registry.find(&vote.voter).map(|r| r.protocol_version) else {
            if ctx.sync.is_list_synced() {
                registry.ask_for_mn(peer, vote.voter, ctx);
            }
            return Err(PaymentRejection::soft(PaymentRejectReason::UnknownVoter(
                vote.voter,
            )));
        };

        // Old blocks may have been voted on by nodes that have not updated yet.
        let need = if vote.height >= tip {
            ctx.min_payments_proto()
        } else {
            MIN_PAYMENTS_PROTO_1
        };
        if protocol_version < need {
            return Err(PaymentRejection::soft(PaymentRejectReason::VoterProtocol {
                have: protocol_version,
                need,
            }));
        }

        // Only masternodes need ranks for past blocks, to pick future winners.
        if !ctx.is_masternode() && vote.height < tip {
            return Ok(());
        }

        let rank = vote
            .height
            .checked_sub(SCORE_SEED_OFFSET)
            .and_then(|h| registry.get_rank(&vote.voter, h, need, false, ctx))
            .ok_or_else(|| PaymentRejection::soft(PaymentRejectReason::Unrankable(vote.voter)))?;

        if rank > SIGNATURES_TOTAL {
            // Our list may be far off for old blocks: only penalise future ones.
            if rank > SIGNATURES_TOTAL * 2 && vote.height > tip {
                warn!(voter = %vote.voter, rank, "voter is not in the top {}", SIGNATURES_TOTAL * 2);
                return Err(PaymentRejection::new(
                    20,
                    PaymentRejectReason::NotInTop {
                        rank,
                        top: SIGNATURES_TOTAL * 2,
                    },
                ));
            }
            return Err(PaymentRejection::soft(PaymentRejectReason::NotInTop {
                rank,
                top: SIGNATURES_TOTAL,
            }));
        }
        Ok(())
    }

    /// Vote for the payee of `height` if we rank among its voters.
    pub fn process_block(&mut self, height: u32, registry: &mut Registry, ctx: &Context) -> bool {
        let Some(local) = ctx.local.as_ref() else {
            return false;
        };
        let Some(outpoint) = local.outpoint else {
            return false;
        };
        // Without the list there is no point trying to pick a winner.
        if !ctx.sync.is_list_synced() {
            return false;
        }

        let min_proto = ctx.min_payments_proto();
        let Some(rank) = height
            .checked_sub(SCORE_SEED_OFFSET)
            .and_then(|h| registry.get_rank(&outpoint, h, min_proto, false, ctx))
        else {
            debug!(%outpoint, height, "unknown masternode, not voting");
            return false;
        };
        if rank > SIGNATURES_TOTAL {
            debug!(rank, "not in the top {SIGNATURES_TOTAL}, not voting");
            return false;
        }

        info!(height, %outpoint, "voting for the next payee");
        let (winner, _) = registry.next_in_queue(height, true, ctx, &*self);
        let Some(winner) = winner else {
            warn!(height, "failed to find masternode to pay");
            return false;
        };
        info!(height, winner = %winner.outpoint, "found masternode to pay");

        let mut vote = PaymentVote::new(outpoint, height, winner.payee());
        vote.sign(&local.service_key.private);
        if !self.add_payment_vote(vote.clone(), ctx) {
            return false;
        }
        self.relay(&vote, ctx);
        true
    }

    /// A new tip arrived: vote a few blocks ahead.
    pub fn updated_block_tip(&mut self, tip: u32, registry: &mut Registry, ctx: &Context) {
        debug!(tip, "payments updated block tip");
        self.process_block(tip.saturating_add(VOTE_AHEAD), registry, ctx);
    }
}
