//! Sync orchestrator for the LMNode layer.
//!
//! Walks a fresh node through sporks, the masternode list and payment votes,
//! in that order, and tells the other engines how far it got.

pub mod asset;
pub mod constants;
pub mod error;
pub mod orchestrator;

pub use asset::SyncAsset;
pub use error::SyncError;
pub use orchestrator::MasternodeSync;
