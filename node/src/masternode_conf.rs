//! `lmnode.conf`: masternodes this operator runs on other hosts.
//!
//! One masternode per line:
//!
//! ```text
//! alias ip:port service_private_key collateral_txid collateral_index
//! ```
//!
//! Lines whose first word starts with `#` are comments. A missing file is
//! created with a commented header.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use lmnode_crypto::{keypair_from_private, private_key_from_hex};
use lmnode_types::{KeyPair, NetworkId, Outpoint, TxHash};

use crate::NodeError;

const HEADER: &str = "# LMNode config file\n\
# Format: alias IP:port lmnode_privatekey collateral_output_txid collateral_output_index\n\
# Example: LMN1 127.0.0.1:28878 0b0f55b1e3f8f7a1e2d9b4c6a8e0f2d4b6a8c0e2f4a6b8d0c2e4f6a8b0d2c4e6 2bcd3c84c84f87eaa86e4e56834c92927a07f9e18718810b92e0d0324456a67c 1\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasternodeEntry {
    pub alias: String,
    pub addr: SocketAddr,
    /// Hex-encoded service private key.
    pub service_key: String,
    pub outpoint: Outpoint,
}

impl MasternodeEntry {
    pub fn service_keypair(&self) -> Result<KeyPair, NodeError> {
        Ok(keypair_from_private(private_key_from_hex(&self.service_key)?))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MasternodeConf {
    entries: Vec<MasternodeEntry>,
}

impl MasternodeConf {
    /// Read `path`, creating it with a header if it does not exist.
    pub fn load(path: &Path, network: NetworkId) -> Result<Self, NodeError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, HEADER)?;
            tracing::info!(path = %path.display(), "created empty masternode config");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, network, path)
    }

    /// Parse the file contents. `path` is only used in error messages.
    pub fn parse(content: &str, network: NetworkId, path: &Path) -> Result<Self, NodeError> {
        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let fail = |reason: String| NodeError::MasternodeConf {
                path: PathBuf::from(path),
                line: line_no,
                reason,
            };

            let words: Vec<&str> = line.split_whitespace().collect();
            match words.first() {
                None => continue,
                Some(first) if first.starts_with('#') => continue,
                Some(_) => {}
            }
            let &[alias, addr, service_key, txid, index, ..] = words.as_slice() else {
                return Err(fail(format!("could not parse \"{line}\"")));
            };

            let addr: SocketAddr = addr
                .parse()
                .map_err(|_| fail(format!("failed to parse host:port string \"{addr}\"")))?;
            if !network.is_valid_service_port(addr.port()) {
                let main_port = NetworkId::Main.default_port();
                let rule = if network == NetworkId::Main {
                    format!("must be {main_port} for mainnet")
                } else {
                    format!("{main_port} could be used only on mainnet")
                };
                return Err(fail(format!("invalid port {} ({rule})", addr.port())));
            }
            let txid: TxHash = txid
                .parse()
                .map_err(|_| fail(format!("invalid collateral txid \"{txid}\"")))?;
            let index: u32 = index
                .parse()
                .map_err(|_| fail(format!("invalid collateral index \"{index}\"")))?;

            tracing::debug!(alias, %addr, "read masternode entry");
            entries.push(MasternodeEntry {
                alias: alias.to_string(),
                addr,
                service_key: service_key.to_string(),
                outpoint: Outpoint::new(txid, index),
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[MasternodeEntry] {
        &self.entries
    }

    pub fn get(&self, alias: &str) -> Option<&MasternodeEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
