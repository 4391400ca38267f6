//! Network-wide feature flags consumed as external signals.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SporkId {
    /// Reject blocks that do not pay the voted masternode.
    PaymentEnforcement,
    /// Only pay masternodes running the newest payment protocol.
    PayUpdatedNodes,
}

pub trait SporkView: Send + Sync {
    fn is_active(&self, spork: SporkId) -> bool;
}
