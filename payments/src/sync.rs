//! Serving and requesting payment votes during sync.

use crate::constants::*;
use crate::error::{PaymentRejectReason, PaymentRejection};
use crate::ledger::PaymentLedger;
use lmnode_messages::{Inventory, SyncItem, SyncStatusCount, WireMessage, MAX_INV_SIZE};
use lmnode_network::{PeerInfo, RequestTag};
use lmnode_registry::Context;
use tracing::{debug, info};

impl PaymentLedger {
    /// Answer a payment sync request. Returns the number of votes announced.
    pub fn process_payment_sync(
        &self,
        peer: &PeerInfo,
        ctx: &Context,
    ) -> Result<usize, PaymentRejection> {
        // Heavy to serve: only once we are fully synced ourselves.
        if !ctx.sync.is_list_synced() || !ctx.sync.is_synced() {
            return Ok(0);
        }
        let now = ctx.now();
        if ctx
            .fulfilled
            .has(&peer.addr, RequestTag::PaymentSyncServed, now)
        {
            info!(%peer.id, "peer already asked for the payment votes");
            return Err(PaymentRejection::new(20, PaymentRejectReason::AlreadyRequested));
        }
        ctx.fulfilled
            .add(&peer.addr, RequestTag::PaymentSyncServed, now);
        Ok(self.sync(peer, ctx))
    }

    /// Announce our verified votes for upcoming blocks to `peer`.
    ///
    /// Older blocks are requested one by one by the peer.
    pub fn sync(&self, peer: &PeerInfo, ctx: &Context) -> usize {
        let Some(tip) = ctx.tip() else {
            return 0;
        };
        let inventory: Vec<Inventory> = self
            .blocks
            .range(tip..tip.saturating_add(VOTE_FUTURE_WINDOW))
            .flat_map(|(_, block)| block.payees())
            .flat_map(|payee| payee.votes.iter())
            .filter(|hash| self.has_verified_vote(hash))
            .map(|hash| Inventory::PaymentVote(*hash))
            .collect();
        let count = inventory.len();
        for chunk in inventory.chunks(MAX_INV_SIZE) {
            ctx.network
                .send(peer.id, WireMessage::Inventory(chunk.to_vec()));
        }
        info!(%peer.id, count, "sent payment votes");
        ctx.network.send(
            peer.id,
            WireMessage::SyncStatusCount(SyncStatusCount {
                item: SyncItem::Winners,
                count: count as u32,
            }),
        );
        count
    }

    /// Ask `peer` for every block we hold no or too few votes for.
    pub fn request_low_data_payment_blocks(
        &self,
        peer: &PeerInfo,
        registry_size: usize,
        ctx: &Context,
    ) {
        let Some(tip) = ctx.tip() else {
            return;
        };
        let limit = self.storage_limit(registry_size);
        let mut batch = Vec::new();
        let flush = |batch: &mut Vec<Inventory>| {
            if !batch.is_empty() {
                debug!(%peer.id, count = batch.len(), "asking peer for payment blocks");
                ctx.network
                    .send(peer.id, WireMessage::GetData(std::mem::take(batch)));
            }
        };

        let oldest = tip.saturating_add(1).saturating_sub(limit);
        for height in (oldest..=tip).rev() {
            if self.blocks.contains_key(&height) {
                continue;
            }
            if let Some(hash) = ctx.chain.block_hash(height) {
                batch.push(Inventory::PaymentBlock(hash));
            }
            if batch.len() == MAX_INV_SIZE {
                flush(&mut batch);
            }
        }

        for (height, block) in &self.blocks {
            // A clear winner, or at least an average number of votes.
            if block.has_quorum() || block.total_votes() >= AVERAGE_VOTES {
                continue;
            }
            if let Some(hash) = ctx.chain.block_hash(*height) {
                batch.push(Inventory::PaymentBlock(hash));
            }
            if batch.len() == MAX_INV_SIZE {
                flush(&mut batch);
            }
        }
        flush(&mut batch);
    }
}
