//! Activation and pinging of this node's own masternode.

use crate::constants::{MIN_MNP_SECONDS, PING_ANCHOR_DEPTH};
use crate::context::{Context, LocalIdentity};
use crate::registry::Registry;
use crate::validation::{is_valid_net_addr, is_valid_port};
use lmnode_messages::{Broadcast, Inventory, Ping};
use lmnode_types::{KeyPair, Outpoint, PROTOCOL_VERSION};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveState {
    /// Node just started, not yet activated.
    Initial,
    /// Waiting for the chain to sync.
    SyncInProcess,
    /// The collateral does not have enough confirmations yet.
    InputTooNew { confirmations: u32 },
    NotCapable(String),
    Started,
}

impl ActiveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::SyncInProcess => "SYNC_IN_PROCESS",
            Self::InputTooNew { .. } => "INPUT_TOO_NEW",
            Self::NotCapable(_) => "NOT_CAPABLE",
            Self::Started => "STARTED",
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "Node just started, not yet activated"),
            Self::SyncInProcess => write!(
                f,
                "Sync in progress. Must wait until sync is complete to start LMNode"
            ),
            Self::InputTooNew { confirmations } => write!(
                f,
                "LMNode input has {confirmations} confirmations, not enough yet"
            ),
            Self::NotCapable(reason) => write!(f, "Not capable lmnode: {reason}"),
            Self::Started => write!(f, "LMNode successfully started"),
        }
    }
}

/// How this masternode was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveKind {
    Unknown,
    /// Announced by an operator elsewhere; we only ping.
    Remote,
    /// We hold the collateral key and announce ourselves.
    Local,
}

impl ActiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Remote => "REMOTE",
            Self::Local => "LOCAL",
        }
    }
}

/// Collateral this node controls directly.
pub struct LocalCollateral {
    pub outpoint: Outpoint,
    pub key: Arc<KeyPair>,
}

pub struct ActiveMasternode {
    service_key: Arc<KeyPair>,
    collateral: Option<LocalCollateral>,
    listen: bool,
    external_addr: Option<SocketAddr>,
    outpoint: Option<Outpoint>,
    service: Option<SocketAddr>,
    state: ActiveState,
    kind: ActiveKind,
    pinger_enabled: bool,
}

impl ActiveMasternode {
    pub fn new(
        service_key: Arc<KeyPair>,
        collateral: Option<LocalCollateral>,
        listen: bool,
        external_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            service_key,
            collateral,
            listen,
            external_addr,
            outpoint: None,
            service: None,
            state: ActiveState::Initial,
            kind: ActiveKind::Unknown,
            pinger_enabled: false,
        }
    }

    pub fn state(&self) -> &ActiveState {
        &self.state
    }

    pub fn kind(&self) -> ActiveKind {
        self.kind
    }

    pub fn outpoint(&self) -> Option<Outpoint> {
        self.outpoint
    }

    pub fn is_started(&self) -> bool {
        self.state == ActiveState::Started
    }

    /// What the engines need to recognise our own records.
    pub fn identity(&self) -> LocalIdentity {
        LocalIdentity {
            service_key: Arc::clone(&self.service_key),
            outpoint: self.outpoint,
            addr: self.service,
        }
    }

    fn not_capable(&mut self, reason: impl Into<String>) {
        self.state = ActiveState::NotCapable(reason.into());
        info!(state = self.state.as_str(), "{}", self.state);
    }

    /// Drive activation one step and ping if started.
    pub fn manage_state(&mut self, registry: &mut Registry, ctx: &Context) {
        if !ctx.params.is_regtest() && !ctx.sync.is_blockchain_synced() {
            self.state = ActiveState::SyncInProcess;
            info!(state = self.state.as_str(), "{}", self.state);
            return;
        }
        if self.state == ActiveState::SyncInProcess {
            self.state = ActiveState::Initial;
        }
        debug!(
            state = self.state.as_str(),
            kind = self.kind.as_str(),
            pinger = self.pinger_enabled,
            "managing own masternode"
        );

        if self.kind == ActiveKind::Unknown {
            self.manage_initial(ctx);
        }
        match self.kind {
            ActiveKind::Remote => self.manage_remote(registry, ctx),
            ActiveKind::Local => {
                // A started local node can be restarted without a new announcement.
                self.manage_remote(registry, ctx);
                if !self.is_started() {
                    self.manage_local(registry, ctx);
                }
            }
            ActiveKind::Unknown => {}
        }

        self.send_ping(registry, ctx);
    }

    fn manage_initial(&mut self, ctx: &Context) {
        if !self.listen {
            self.not_capable("LMNode must accept connections from outside, enable listen");
            return;
        }
        let Some(service) = self.external_addr.filter(|a| is_valid_net_addr(a, ctx)) else {
            if ctx.network.peers().is_empty() {
                self.not_capable(
                    "Can't detect valid external address. Will retry when there are some connections available.",
                );
            } else {
                self.not_capable(
                    "Can't detect valid external address. Please set external_addr to a public IPv4 address.",
                );
            }
            return;
        };
        if !is_valid_port(service.port(), ctx.params.network) {
            self.not_capable(format!(
                "Invalid port: {} is not allowed on {}",
                service.port(),
                ctx.params.network.as_str()
            ));
            return;
        }
        info!(%service, "checking inbound connection");
        if let Err(e) = ctx.network.connect_masternode(service) {
            self.not_capable(format!("Could not connect to {service}: {e}"));
            return;
        }
        self.service = Some(service);
        self.kind = if self.collateral.is_some() {
            ActiveKind::Local
        } else {
            ActiveKind::Remote
        };
    }

    fn manage_remote(&mut self, registry: &mut Registry, ctx: &Context) {
        registry.check_masternode_by_key(&self.service_key.public, ctx, false);
        let Some(info) = registry.get_info_by_service_key(&self.service_key.public) else {
            self.not_capable("LMNode not in lmnode list");
            return;
        };
        if info.protocol_version != PROTOCOL_VERSION {
            self.not_capable("Invalid protocol version");
            return;
        }
        if self.service != Some(info.addr) {
            self.not_capable(
                "Broadcasted IP doesn't match our external address. Make sure you issued a new broadcast if IP of this lmnode changed recently.",
            );
            return;
        }
        if !info.state.is_valid_for_auto_start() {
            self.not_capable(format!("LMNode in {} state", info.state));
            return;
        }
        if !self.is_started() {
            info!(outpoint = %info.outpoint, "masternode started");
            self.outpoint = Some(info.outpoint);
            self.service = Some(info.addr);
            self.pinger_enabled = true;
            self.state = ActiveState::Started;
        }
    }

    fn manage_local(&mut self, registry: &mut Registry, ctx: &Context) {
        if self.is_started() {
            return;
        }
        let (Some(collateral), Some(service)) = (&self.collateral, self.service) else {
            return;
        };
        let outpoint = collateral.outpoint;
        let collateral_key = Arc::clone(&collateral.key);

        let utxo = match ctx.chain.utxo(&outpoint) {
            Ok(Some(utxo)) => utxo,
            Ok(None) => {
                self.not_capable(format!("Collateral {outpoint} not found"));
                return;
            }
            Err(e) => {
                debug!(error = %e, "chain busy, retrying activation later");
                return;
            }
        };
        let confirmations = ctx
            .tip()
            .map_or(0, |tip| (tip + 1).saturating_sub(utxo.height));
        if confirmations < ctx.params.min_collateral_confirmations {
            self.state = ActiveState::InputTooNew { confirmations };
            info!(state = self.state.as_str(), "{}", self.state);
            return;
        }

        let mnb = match create_broadcast(outpoint, service, &collateral_key, &self.service_key, ctx) {
            Ok(mnb) => mnb,
            Err(reason) => {
                self.not_capable(format!("Error creating lmnode broadcast: {reason}"));
                return;
            }
        };

        self.outpoint = Some(outpoint);
        self.pinger_enabled = true;
        self.state = ActiveState::Started;

        info!(%outpoint, "updating masternode list with our announcement");
        let hash = mnb.hash();
        registry.update_masternode_list(mnb, ctx);
        info!(%outpoint, "relaying our announcement");
        ctx.network.relay(Inventory::Announce(hash));
    }

    /// Sign and relay a fresh ping for our record.
    pub fn send_ping(&mut self, registry: &mut Registry, ctx: &Context) -> bool {
        if !self.pinger_enabled {
            debug!(state = self.state.as_str(), "ping service is disabled, skipping");
            return false;
        }
        let Some(outpoint) = self.outpoint else {
            return false;
        };
        if !registry.has(&outpoint) {
            self.not_capable("LMNode not in lmnode list");
            return false;
        }
        let Some(ping) = create_ping(outpoint, &self.service_key, ctx) else {
            debug!("no anchor block for ping yet");
            return false;
        };
        if registry.is_pinged_within(&outpoint, MIN_MNP_SECONDS, ping.sig_time) {
            debug!("too early to send ping");
            return false;
        }
        let hash = ping.hash();
        registry.set_last_ping(ping);
        info!(%outpoint, "relaying ping");
        ctx.network.relay(Inventory::Ping(hash));
        true
    }
}

/// A ping anchored [`PING_ANCHOR_DEPTH`] blocks below the tip.
pub fn create_ping(outpoint: Outpoint, service_key: &KeyPair, ctx: &Context) -> Option<Ping> {
    let tip = ctx.tip()?;
    let anchor = ctx.chain.block_hash(tip.checked_sub(PING_ANCHOR_DEPTH)?)?;
    let mut ping = Ping::new(outpoint, anchor, ctx.now());
    ping.sign(&service_key.private);
    Some(ping)
}

/// A signed announcement with an embedded ping.
pub fn create_broadcast(
    outpoint: Outpoint,
    service: SocketAddr,
    collateral_key: &KeyPair,
    service_key: &KeyPair,
    ctx: &Context,
) -> Result<Broadcast, String> {
    if !ctx.params.is_regtest() && !ctx.sync.is_blockchain_synced() {
        return Err("sync in progress".into());
    }
    let ping = create_ping(outpoint, service_key, ctx)
        .ok_or_else(|| "chain is too short to anchor a ping".to_string())?;
    let mut mnb = Broadcast::new(
        outpoint,
        service,
        collateral_key.public.clone(),
        service_key.public.clone(),
        PROTOCOL_VERSION,
        ctx.now(),
    );
    mnb.last_ping = Some(ping);
    mnb.sign(&collateral_key.private);
    Ok(mnb)
}
