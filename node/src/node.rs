//! LMNode service: engine construction, periodic tasks and operator commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lmnode_messages::{Broadcast, Inventory};
use lmnode_payments::PaymentLedger;
use lmnode_registry::active::create_broadcast;
use lmnode_registry::constants::MIN_MNP_SECONDS;
use lmnode_registry::{ActiveMasternode, MasternodeInfo, Registry};
use lmnode_types::{ConsensusParams, KeyPair, MasternodeState};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::handle::{Host, NodeHandle};
use crate::masternode_conf::{MasternodeConf, MasternodeEntry};
use crate::persistence;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// How long `stop()` waits for background tasks before giving up.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before the local masternode is first managed.
const FIRST_MANAGE_DELAY: Duration = Duration::from_secs(15);

/// Prometheus textfile written after each maintenance pass when metrics are enabled.
pub const METRICS_FILE: &str = "lmnode.prom";

/// Which configured masternodes `start_many` announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartFilter {
    All,
    /// Only masternodes the registry does not know.
    Missing,
    /// Only masternodes that are unknown or not enabled.
    Disabled,
}

/// Outcome of starting one configured masternode.
#[derive(Debug)]
pub struct StartResult {
    pub alias: String,
    pub result: Result<(), NodeError>,
}

/// A configured masternode together with what the registry knows about it.
#[derive(Clone, Debug)]
pub struct ConfiguredMasternode {
    pub entry: MasternodeEntry,
    pub info: Option<MasternodeInfo>,
}

impl ConfiguredMasternode {
    pub fn status(&self) -> &'static str {
        self.info.as_ref().map_or("MISSING", |i| i.state.as_str())
    }
}

pub struct LmnodeNode {
    config: NodeConfig,
    handle: NodeHandle,
    masternode_conf: MasternodeConf,
    shutdown: Arc<ShutdownController>,
    task_handles: Vec<JoinHandle<()>>,
}

impl LmnodeNode {
    /// Build every engine, restoring cached state from the data directory.
    pub fn new(config: NodeConfig, host: Host) -> Result<Self, NodeError> {
        config.validate()?;
        let params = ConsensusParams::for_network(config.network);

        let registry: Registry = persistence::load(&config.data_dir);
        let payments: PaymentLedger = persistence::load(&config.data_dir);
        let masternode_conf = MasternodeConf::load(&config.masternode_conf_path(), config.network)?;

        let active = match config.service_keypair()? {
            Some(keys) => Some(ActiveMasternode::new(
                Arc::new(keys),
                config.local_collateral()?,
                config.listen,
                config.external_addr,
            )),
            None => None,
        };

        tracing::info!(
            network = ?config.network,
            data_dir = %config.data_dir.display(),
            masternode = active.is_some(),
            known = registry.size(),
            payment_blocks = payments.block_count(),
            configured = masternode_conf.len(),
            "LMNode service initialised"
        );

        let handle = NodeHandle::new(params, host, registry, payments, active);
        Ok(Self {
            config,
            handle,
            masternode_conf,
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        })
    }

    /// Cloneable handle for the host's message and block callbacks.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn masternode_conf(&self) -> &MasternodeConf {
        &self.masternode_conf
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the periodic tasks.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if !self.task_handles.is_empty() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!("LMNode service starting");
        self.handle.refresh_metrics().await;

        // ── Sync tick: staged sync and scheduled recovery requests ──────
        let handle = self.handle.clone();
        let period = Duration::from_secs(self.config.sync_interval_secs);
        let mut shutdown_rx = self.shutdown.subscribe();
        let sync_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("sync task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        handle.sync_tick().await;
                    }
                }
            }
        });
        self.task_handles.push(sync_handle);

        // ── Maintenance: expiry, duplicate addresses, verification ──────
        let handle = self.handle.clone();
        let period = Duration::from_secs(self.config.maintenance_interval_secs);
        let metrics_file = self
            .config
            .enable_metrics
            .then(|| self.config.data_dir.join(METRICS_FILE));
        let mut shutdown_rx = self.shutdown.subscribe();
        let maintenance_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; nothing is stale yet.
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("maintenance task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        handle.maintenance().await;
                        if let Some(path) = &metrics_file {
                            if let Err(e) = std::fs::write(path, handle.metrics.encode()) {
                                tracing::warn!(path = %path.display(), "failed to write metrics: {e}");
                            }
                        }
                    }
                }
            }
        });
        self.task_handles.push(maintenance_handle);

        // ── Local masternode: activation and pings ──────────────────────
        if self.handle.is_masternode() {
            let handle = self.handle.clone();
            let mut shutdown_rx = self.shutdown.subscribe();
            let active_handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(
                    tokio::time::Instant::now() + FIRST_MANAGE_DELAY,
                    Duration::from_secs(MIN_MNP_SECONDS),
                );
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("local masternode task shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            handle.manage_local().await;
                        }
                    }
                }
            });
            self.task_handles.push(active_handle);
        }

        tracing::info!(tasks = self.task_handles.len(), "LMNode service started");
        Ok(())
    }

    /// Stop the tasks and write the caches.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("LMNode service stopping");
        self.shutdown.shutdown();

        let handles = std::mem::take(&mut self.task_handles);
        let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!("task ended abnormally: {e}");
                }
            }
        })
        .await;
        if joined.is_err() {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "timed out waiting for tasks to stop"
            );
        }

        self.persist().await?;
        tracing::info!("LMNode service stopped");
        Ok(())
    }

    /// Write `lmncache.dat` and `lmnpayments.dat`.
    pub async fn persist(&self) -> Result<(), NodeError> {
        let dir = &self.config.data_dir;
        {
            let registry = self.handle.registry.lock().await;
            persistence::save(dir, &*registry)?;
        }
        let payments = self.handle.payments.lock().await;
        persistence::save(dir, &*payments)?;
        Ok(())
    }

    // ── Operator commands ───────────────────────────────────────────────

    /// Announce the configured masternode `alias`, signed with its collateral key.
    pub async fn start_alias(
        &self,
        alias: &str,
        collateral_key: &KeyPair,
    ) -> Result<Broadcast, NodeError> {
        let entry = self
            .masternode_conf
            .get(alias)
            .ok_or_else(|| NodeError::UnknownAlias(alias.to_string()))?;
        self.announce(entry, collateral_key).await
    }

    /// Announce several configured masternodes. `collateral_keys` is keyed by alias.
    pub async fn start_many(
        &self,
        filter: StartFilter,
        collateral_keys: &HashMap<String, KeyPair>,
    ) -> Vec<StartResult> {
        let mut results = Vec::new();
        for entry in self.masternode_conf.entries() {
            let state = {
                let registry = self.handle.registry.lock().await;
                registry.find(&entry.outpoint).map(|r| r.state)
            };
            let skip = match filter {
                StartFilter::All => false,
                StartFilter::Missing => state.is_some(),
                StartFilter::Disabled => state == Some(MasternodeState::Enabled),
            };
            if skip {
                continue;
            }
            let result = match collateral_keys.get(&entry.alias) {
                Some(key) => self.announce(entry, key).await.map(|_| ()),
                None => Err(NodeError::MissingCollateralKey(entry.alias.clone())),
            };
            if let Err(e) = &result {
                tracing::warn!(alias = %entry.alias, "failed to start masternode: {e}");
            }
            results.push(StartResult {
                alias: entry.alias.clone(),
                result,
            });
        }
        results
    }

    async fn announce(
        &self,
        entry: &MasternodeEntry,
        collateral_key: &KeyPair,
    ) -> Result<Broadcast, NodeError> {
        let service_key = entry.service_keypair()?;
        let mut registry = self.handle.registry.lock().await;
        let ctx = self.handle.context();
        let mnb = create_broadcast(entry.outpoint, entry.addr, collateral_key, &service_key, &ctx)
            .map_err(NodeError::BroadcastRejected)?;
        registry.update_masternode_list(mnb.clone(), &ctx);
        ctx.network.relay(Inventory::Announce(mnb.hash()));
        tracing::info!(alias = %entry.alias, outpoint = %entry.outpoint, "masternode announced");
        Ok(mnb)
    }

    /// Every configured masternode with its registry status.
    pub async fn my_masternodes(&self) -> Vec<ConfiguredMasternode> {
        let registry = self.handle.registry.lock().await;
        self.masternode_conf
            .entries()
            .iter()
            .map(|entry| ConfiguredMasternode {
                entry: entry.clone(),
                info: registry.get_info(&entry.outpoint),
            })
            .collect()
    }
}
