//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lmnode_crypto::{keypair_from_private, private_key_from_hex};
use lmnode_registry::LocalCollateral;
use lmnode_types::{KeyPair, NetworkId, Outpoint, TxHash};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for an LMNode service.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network the host node runs on.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Directory holding `lmncache.dat`, `lmnpayments.dat` and `lmnode.conf`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Whether the host accepts inbound connections. Required to run a masternode.
    #[serde(default = "default_true")]
    pub listen: bool,

    /// Publicly reachable service address announced for our masternode.
    #[serde(default)]
    pub external_addr: Option<SocketAddr>,

    /// Run as a masternode.
    #[serde(default)]
    pub masternode: bool,

    /// Hex-encoded service private key. Required with `masternode = true`.
    #[serde(default)]
    pub service_key: Option<String>,

    /// Collateral transaction id, when this node announces itself.
    #[serde(default)]
    pub collateral_txid: Option<String>,

    /// Collateral output index.
    #[serde(default)]
    pub collateral_index: Option<u32>,

    /// Hex-encoded private key of the collateral output.
    #[serde(default)]
    pub collateral_key: Option<String>,

    /// Remote masternodes managed by this operator, relative to `data_dir`.
    #[serde(default = "default_masternode_conf")]
    pub masternode_conf: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Seconds between sync ticks.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Seconds between registry, payment and proof-of-service maintenance passes.
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Main
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./lmnode_data")
}

fn default_true() -> bool {
    true
}

fn default_masternode_conf() -> PathBuf {
    PathBuf::from("lmnode.conf")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sync_interval() -> u64 {
    1
}

fn default_maintenance_interval() -> u64 {
    60
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Reject combinations the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.masternode && self.service_key.is_none() {
            return Err(NodeError::Config(
                "masternode = true requires service_key".into(),
            ));
        }
        let collateral_fields = [
            self.collateral_txid.is_some(),
            self.collateral_index.is_some(),
            self.collateral_key.is_some(),
        ];
        if collateral_fields.iter().any(|set| *set) && !collateral_fields.iter().all(|set| *set) {
            return Err(NodeError::Config(
                "collateral_txid, collateral_index and collateral_key must be set together".into(),
            ));
        }
        if self.sync_interval_secs == 0 || self.maintenance_interval_secs == 0 {
            return Err(NodeError::Config("task intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn log_format(&self) -> LogFormat {
        match self.log_format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }

    /// The service key pair, when running as a masternode.
    pub fn service_keypair(&self) -> Result<Option<KeyPair>, NodeError> {
        if !self.masternode {
            return Ok(None);
        }
        let Some(hex_key) = &self.service_key else {
            return Ok(None);
        };
        Ok(Some(keypair_from_private(private_key_from_hex(hex_key)?)))
    }

    /// Collateral this node announces itself with, if configured.
    pub fn local_collateral(&self) -> Result<Option<LocalCollateral>, NodeError> {
        let (Some(txid), Some(index), Some(key)) = (
            &self.collateral_txid,
            self.collateral_index,
            &self.collateral_key,
        ) else {
            return Ok(None);
        };
        let txid: TxHash = txid
            .parse()
            .map_err(|_| NodeError::Config(format!("invalid collateral_txid {txid}")))?;
        Ok(Some(LocalCollateral {
            outpoint: Outpoint::new(txid, index),
            key: Arc::new(keypair_from_private(private_key_from_hex(key)?)),
        }))
    }

    pub fn masternode_conf_path(&self) -> PathBuf {
        self.data_dir.join(&self.masternode_conf)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            listen: default_true(),
            external_addr: None,
            masternode: false,
            service_key: None,
            collateral_txid: None,
            collateral_index: None,
            collateral_key: None,
            masternode_conf: default_masternode_conf(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            sync_interval_secs: default_sync_interval(),
            maintenance_interval_secs: default_maintenance_interval(),
        }
    }
}
