//! Coinbase payee rules for block assembly and validation.

use crate::error::PaymentError;
use crate::ledger::PaymentLedger;
use lmnode_chain::{SporkId, TxOut};
use lmnode_registry::{Context, Registry};
use lmnode_types::Amount;
use tracing::{debug, info, warn};

/// Total value paid by `outputs`, saturating on overflow.
pub fn total_value(outputs: &[TxOut]) -> Amount {
    outputs.iter().fold(Amount::ZERO, |sum, out| {
        sum.checked_add(out.value).unwrap_or(Amount::new(u64::MAX))
    })
}

/// A coinbase may never pay more than the block reward.
pub fn is_block_value_valid(
    height: u32,
    coinbase_value: Amount,
    reward: Amount,
) -> Result<(), PaymentError> {
    if coinbase_value > reward {
        return Err(PaymentError::BlockValueTooHigh {
            height,
            actual: coinbase_value,
            limit: reward,
        });
    }
    Ok(())
}

impl PaymentLedger {
    /// Whether `coinbase` pays the payee the votes for `height` require.
    ///
    /// Heights without votes accept any coinbase.
    pub fn is_transaction_valid(&self, coinbase: &[TxOut], height: u32, ctx: &Context) -> bool {
        let Some(block) = self.blocks.get(&height) else {
            return true;
        };
        let payment = ctx
            .params
            .masternode_payment(height, total_value(coinbase));
        block.is_transaction_valid(coinbase, payment)
    }

    /// Payee validation as applied to incoming blocks.
    pub fn is_block_payee_valid(&self, coinbase: &[TxOut], height: u32, ctx: &Context) -> bool {
        if height < ctx.params.payments_start_block {
            debug!(height, "masternode payments not started");
            return true;
        }
        if !ctx.sync.is_synced() {
            debug!(height, "not synced, skipping block payee checks");
            return true;
        }
        if self.is_transaction_valid(coinbase, height, ctx) {
            debug!(height, "valid masternode payment");
            return true;
        }
        if ctx.sporks.is_active(SporkId::PaymentEnforcement) {
            return false;
        }
        info!(height, "masternode payment enforcement is disabled, accepting block");
        true
    }

    /// The masternode output for a block we are assembling at `height`.
    ///
    /// Uses the best voted payee, falling back to our own queue calculation.
    pub fn fill_block_payee(
        &self,
        height: u32,
        payment: Amount,
        registry: &mut Registry,
        ctx: &Context,
    ) -> Option<TxOut> {
        let (payee, voted) = match self.get_block_payee(height) {
            Some(payee) => (payee, true),
            None => {
                let Some(winner) = registry.next_in_queue(height, true, ctx, self).0 else {
                    warn!(height, "failed to detect masternode to pay");
                    return None;
                };
                (winner.payee(), false)
            }
        };
        info!(height, %payee, %payment, voted, "masternode payment");
        Some(TxOut::new(payee, payment))
    }

    /// `payee:votes, …` for `height`, or `Unknown`.
    pub fn get_required_payments_string(&self, height: u32) -> String {
        self.blocks
            .get(&height)
            .map_or_else(|| "Unknown".to_string(), ToString::to_string)
    }
}
