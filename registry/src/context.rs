//! Host collaborators borrowed for the duration of one engine call.

use crate::constants::min_payments_proto;
use lmnode_chain::{ChainView, Clock, Random, SporkView, SyncStatus};
use lmnode_network::{FulfilledRequests, PeerNetwork};
use lmnode_types::{ConsensusParams, KeyPair, Outpoint, PublicKey, Timestamp};
use std::net::SocketAddr;
use std::sync::Arc;

/// Identity of this node when it runs as a masternode.
#[derive(Clone)]
pub struct LocalIdentity {
    pub service_key: Arc<KeyPair>,
    /// Our collateral, once the masternode is activated.
    pub outpoint: Option<Outpoint>,
    /// Our announced service address.
    pub addr: Option<SocketAddr>,
}

impl LocalIdentity {
    pub fn service_public(&self) -> &PublicKey {
        &self.service_key.public
    }
}

/// Everything an engine reaches outside of its own state.
pub struct Context<'a> {
    pub params: &'a ConsensusParams,
    pub chain: &'a dyn ChainView,
    pub network: &'a dyn PeerNetwork,
    pub sporks: &'a dyn SporkView,
    pub sync: &'a dyn SyncStatus,
    pub clock: &'a dyn Clock,
    pub random: &'a dyn Random,
    pub fulfilled: &'a FulfilledRequests,
    /// `Some` when running as a masternode.
    pub local: Option<LocalIdentity>,
}

impl Context<'_> {
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn tip(&self) -> Option<u32> {
        self.chain.tip_height()
    }

    pub fn is_masternode(&self) -> bool {
        self.local.is_some()
    }

    /// Our collateral, if we are an activated masternode.
    pub fn active_outpoint(&self) -> Option<Outpoint> {
        self.local.as_ref().and_then(|l| l.outpoint)
    }

    /// Whether `key` is our own service key.
    pub fn is_own_service_key(&self, key: &PublicKey) -> bool {
        self.local
            .as_ref()
            .is_some_and(|l| l.service_public() == key)
    }

    pub fn min_payments_proto(&self) -> u32 {
        min_payments_proto(self.sporks)
    }
}
