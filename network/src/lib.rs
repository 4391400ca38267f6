//! Peer network seam for the masternode layer.
//!
//! Transport, framing and general peer scoring belong to the host node.
//! The engines see peers only through [`PeerNetwork`] and remember which
//! per-peer requests were already served in [`FulfilledRequests`].

pub mod error;
pub mod fulfilled;
pub mod peer;

pub use error::NetworkError;
pub use fulfilled::{FulfilledRequests, RequestTag};
pub use peer::{PeerId, PeerInfo, PeerNetwork};
