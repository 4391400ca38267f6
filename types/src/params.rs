//! Consensus parameters for the masternode layer, per network.

use crate::amount::Amount;
use crate::network::NetworkId;
use serde::{Deserialize, Serialize};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u32 = 90024;

/// Masternode-related consensus parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub network: NetworkId,

    // ── Collateral ───────────────────────────────────────────────────────
    /// Exact value the collateral output must hold.
    pub collateral: Amount,
    /// Confirmations the collateral needs before a broadcast is accepted.
    pub min_collateral_confirmations: u32,

    // ── Payments ─────────────────────────────────────────────────────────
    /// First height at which masternode payments are validated.
    pub payments_start_block: u32,
    /// Masternode share of the coinbase value, in percent.
    pub payment_percent: u64,

    // ── Chain ────────────────────────────────────────────────────────────
    /// Maximum age (seconds) of the newest block before the chain counts as stale.
    pub max_tip_age_secs: u64,
}

impl ConsensusParams {
    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Main => Self {
                network,
                collateral: Amount::from_coins(1000),
                min_collateral_confirmations: 15,
                payments_start_block: 20380,
                payment_percent: 30,
                max_tip_age_secs: 6 * 60 * 60,
            },
            NetworkId::Test => Self {
                network,
                collateral: Amount::from_coins(1000),
                min_collateral_confirmations: 15,
                payments_start_block: 1500,
                payment_percent: 30,
                max_tip_age_secs: 0x7fff_ffff,
            },
            NetworkId::Regtest => Self {
                network,
                collateral: Amount::from_coins(1000),
                min_collateral_confirmations: 1,
                payments_start_block: 240,
                payment_percent: 30,
                max_tip_age_secs: 6 * 60 * 60,
            },
        }
    }

    /// The masternode payment for a block whose coinbase pays `block_value` in total.
    pub fn masternode_payment(&self, _height: u32, block_value: Amount) -> Amount {
        block_value.mul_div(self.payment_percent, 100)
    }

    pub fn is_regtest(&self) -> bool {
        self.network == NetworkId::Regtest
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::for_network(NetworkId::Main)
    }
}
