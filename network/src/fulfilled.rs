//! Per-peer "already done" markers with expiry.
//!
//! Remembers, per peer address, which one-shot requests were sent to or
//! served for that peer, so that a request is neither repeated nor answered
//! twice inside the expiry window.

use lmnode_types::Timestamp;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

/// Default marker lifetime: one hour.
pub const DEFAULT_FULFILLED_EXPIRY_SECS: u64 = 60 * 60;

/// The kinds of one-shot requests tracked per peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// We asked this peer for its sporks.
    SporkSync,
    /// We asked this peer for the masternode list.
    ListSync,
    /// We asked this peer for payment votes.
    PaymentSync,
    /// Peer was connected while we were fully synced.
    FullSync,
    /// This peer asked us for payment votes.
    PaymentSyncServed,
    /// We sent this peer a proof-of-service challenge.
    VerifyRequest,
    /// We answered a proof-of-service challenge from this peer.
    VerifyReply,
    /// We verified this peer's address.
    VerifyDone,
}

impl RequestTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SporkSync => "spork-sync",
            Self::ListSync => "lmnode-list-sync",
            Self::PaymentSync => "lmnode-payment-sync",
            Self::FullSync => "full-sync",
            Self::PaymentSyncServed => "mnget",
            Self::VerifyRequest => "mnv-request",
            Self::VerifyReply => "mnv-reply",
            Self::VerifyDone => "mnv-done",
        }
    }
}

/// Thread-safe fulfilled-request cache.
pub struct FulfilledRequests {
    expiry_secs: u64,
    entries: Mutex<HashMap<(SocketAddr, RequestTag), Timestamp>>,
}

impl FulfilledRequests {
    pub fn new(expiry_secs: u64) -> Self {
        Self {
            expiry_secs,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `tag` was recorded for `addr` and has not yet expired.
    pub fn has(&self, addr: &SocketAddr, tag: RequestTag, now: Timestamp) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&(*addr, tag))
            .is_some_and(|expires| *expires > now)
    }

    pub fn add(&self, addr: &SocketAddr, tag: RequestTag, now: Timestamp) {
        self.entries
            .lock()
            .unwrap()
            .insert((*addr, tag), now.plus_secs(self.expiry_secs));
    }

    pub fn remove(&self, addr: &SocketAddr, tag: RequestTag) {
        self.entries.lock().unwrap().remove(&(*addr, tag));
    }

    /// Drop `tag` for every peer.
    pub fn remove_all(&self, tag: RequestTag) {
        self.entries.lock().unwrap().retain(|(_, t), _| *t != tag);
    }

    /// Drop expired markers.
    pub fn check_and_remove(&self, now: Timestamp) {
        self.entries
            .lock()
            .unwrap()
            .retain(|_, expires| *expires > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FulfilledRequests {
    fn default() -> Self {
        Self::new(DEFAULT_FULFILLED_EXPIRY_SECS)
    }
}
