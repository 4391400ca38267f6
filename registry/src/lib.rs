//! Masternode registry for the LMNode layer.
//!
//! Holds the canonical set of masternode records keyed by collateral,
//! validates announcements and pings, serves list requests, recovers
//! records that need a new start, and ranks masternodes deterministically
//! for payment and proof-of-service.
//!
//! The payment ledger is consulted only through [`PaymentSchedule`], so this
//! crate does not depend on it.

pub mod active;
pub mod announce;
pub mod constants;
pub mod context;
pub mod error;
pub mod index;
pub mod record;
pub mod registry;
pub mod schedule;
pub mod selection;
pub mod validation;

pub use active::{ActiveKind, ActiveMasternode, ActiveState, LocalCollateral};
pub use context::{Context, LocalIdentity};
pub use error::{RegistryError, RejectReason, Rejection};
pub use index::MasternodeIndex;
pub use record::{CheckEnv, MasternodeInfo, MasternodeRecord};
pub use registry::{Registry, REGISTRY_SNAPSHOT_VERSION};
pub use schedule::PaymentSchedule;
pub use selection::NotQualified;
