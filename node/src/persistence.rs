//! `lmncache.dat` / `lmnpayments.dat`: engine snapshots kept across restarts.
//!
//! Snapshots are written at shutdown and read at start-up. An unreadable
//! or outdated file is not fatal: the engine starts empty and the data is
//! synced again from peers.

use std::path::{Path, PathBuf};

use lmnode_payments::PaymentLedger;
use lmnode_registry::Registry;

use crate::NodeError;

pub const REGISTRY_CACHE_FILE: &str = "lmncache.dat";
pub const PAYMENTS_CACHE_FILE: &str = "lmnpayments.dat";

/// An engine whose state is snapshotted to the data directory.
pub trait Snapshot: Sized + Default {
    const FILE: &'static str;
    const KIND: &'static str;

    fn encode(&self) -> Result<Vec<u8>, NodeError>;
    fn decode(bytes: &[u8]) -> Result<Self, NodeError>;
}

impl Snapshot for Registry {
    const FILE: &'static str = REGISTRY_CACHE_FILE;
    const KIND: &'static str = "masternode cache";

    fn encode(&self) -> Result<Vec<u8>, NodeError> {
        Ok(self.serialize()?)
    }

    fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        Ok(Registry::deserialize(bytes)?)
    }
}

impl Snapshot for PaymentLedger {
    const FILE: &'static str = PAYMENTS_CACHE_FILE;
    const KIND: &'static str = "masternode payments cache";

    fn encode(&self) -> Result<Vec<u8>, NodeError> {
        Ok(self.serialize()?)
    }

    fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        Ok(PaymentLedger::deserialize(bytes)?)
    }
}

pub fn snapshot_path<T: Snapshot>(dir: &Path) -> PathBuf {
    dir.join(T::FILE)
}

/// Load `T` from `dir`, or an empty `T` if the file is missing or unusable.
pub fn load<T: Snapshot>(dir: &Path) -> T {
    let path = snapshot_path::<T>(dir);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no {} yet, starting empty", T::KIND);
            return T::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot read {}: {e}", T::KIND);
            return T::default();
        }
    };
    match T::decode(&bytes) {
        Ok(value) => {
            tracing::info!(path = %path.display(), bytes = bytes.len(), "loaded {}", T::KIND);
            value
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "{} is unusable, starting empty: {e}", T::KIND);
            T::default()
        }
    }
}

/// Write `value` to `dir`, replacing any previous snapshot atomically.
pub fn save<T: Snapshot>(dir: &Path, value: &T) -> Result<(), NodeError> {
    std::fs::create_dir_all(dir)?;
    let path = snapshot_path::<T>(dir);
    let tmp = path.with_extension("dat.new");
    let bytes = value.encode()?;
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, &path)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote {}", T::KIND);
    Ok(())
}
