//! LMNode service: wires the masternode engines into a running node.
//!
//! The service:
//! - Dispatches inbound masternode messages to the registry, payment
//!   ledger, proof-of-service verifier and sync orchestrator
//! - Runs the periodic sync, maintenance and local-masternode tasks
//! - Persists the registry and payment caches across restarts
//! - Announces operator-configured masternodes from `lmnode.conf`
//!
//! Transport, chain state and sporks belong to the host and come in through
//! [`Host`].

pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod masternode_conf;
pub mod metrics;
pub mod node;
pub mod persistence;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use handle::{Host, NodeHandle};
pub use logging::{init_logging, LogFormat};
pub use masternode_conf::{MasternodeConf, MasternodeEntry};
pub use metrics::NodeMetrics;
pub use node::{ConfiguredMasternode, LmnodeNode, StartFilter, StartResult};
pub use shutdown::ShutdownController;
