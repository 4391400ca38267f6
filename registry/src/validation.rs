//! Stateless checks on announcements and pings.
//!
//! These only consult the chain and the clock; everything that needs the
//! registry's own state lives in `announce.rs`.

use crate::constants::MAX_FUTURE_SIG_SECONDS;
use crate::context::Context;
use crate::error::{RejectReason, Rejection};
use lmnode_crypto::payee_script;
use lmnode_messages::{Broadcast, Ping};
use lmnode_types::{is_routable_addr, NetworkId, PAY_TO_KEY_ID_LEN};
use std::net::SocketAddr;
use tracing::debug;

/// Whether `addr` may be announced as a service address on this network.
pub fn is_valid_net_addr(addr: &SocketAddr, ctx: &Context) -> bool {
    ctx.params.is_regtest() || is_routable_addr(addr)
}

/// Mainnet requires the default port, every other network forbids it.
pub fn is_valid_port(port: u16, network: NetworkId) -> bool {
    let mainnet = NetworkId::Main.default_port();
    match network {
        NetworkId::Main => port == mainnet,
        _ => port != mainnet,
    }
}

/// Context-free checks on a ping: signature time and anchor block.
pub fn ping_simple_check(ping: &Ping, ctx: &Context) -> Result<u32, Rejection> {
    if ping.sig_time > ctx.now().plus_secs(MAX_FUTURE_SIG_SECONDS) {
        return Err(Rejection::new(1, RejectReason::FutureSigTime));
    }
    ctx.chain
        .block_height(&ping.block_hash)
        .ok_or_else(|| Rejection::soft(RejectReason::UnknownBlock(ping.block_hash)))
}

/// Checks that need neither the registry nor the UTXO set.
///
/// Returns whether the embedded ping is usable. An announcement with a
/// missing or invalid ping is still accepted, its record starts `EXPIRED`.
pub fn simple_check(mnb: &Broadcast, ctx: &Context) -> Result<bool, Rejection> {
    if !is_valid_net_addr(&mnb.addr, ctx) {
        return Err(Rejection::soft(RejectReason::InvalidAddress(mnb.addr)));
    }

    if mnb.sig_time > ctx.now().plus_secs(MAX_FUTURE_SIG_SECONDS) {
        return Err(Rejection::new(1, RejectReason::FutureSigTime));
    }

    let ping_valid = mnb
        .last_ping
        .as_ref()
        .is_some_and(|ping| ping_simple_check(ping, ctx).is_ok());

    if mnb.protocol_version < ctx.min_payments_proto() {
        return Err(Rejection::soft(RejectReason::OutdatedProtocol(
            mnb.protocol_version,
        )));
    }

    if payee_script(&mnb.collateral_key).len() != PAY_TO_KEY_ID_LEN
        || payee_script(&mnb.service_key).len() != PAY_TO_KEY_ID_LEN
    {
        return Err(Rejection::new(100, RejectReason::BadKeyScript));
    }

    if !mnb.script_sig.is_empty() {
        return Err(Rejection::new(100, RejectReason::NonEmptyScriptSig));
    }

    if !is_valid_port(mnb.addr.port(), ctx.params.network) {
        return Err(Rejection::soft(RejectReason::InvalidPort(mnb.addr.port())));
    }

    Ok(ping_valid)
}

pub fn check_signature(mnb: &Broadcast) -> Result<(), Rejection> {
    if mnb.verify() {
        Ok(())
    } else {
        Err(Rejection::new(100, RejectReason::BadSignature))
    }
}

/// Validate the collateral behind an announcement against the UTXO set.
pub fn check_outpoint(mnb: &Broadcast, ctx: &Context) -> Result<(), Rejection> {
    if ctx.active_outpoint() == Some(mnb.outpoint) && ctx.is_own_service_key(&mnb.service_key) {
        return Err(Rejection::soft(RejectReason::OwnCollateral));
    }

    check_signature(mnb)?;

    let utxo = ctx
        .chain
        .utxo(&mnb.outpoint)
        .map_err(|e| Rejection::soft(RejectReason::ChainUnavailable(e.to_string())))?
        .ok_or_else(|| Rejection::soft(RejectReason::CollateralNotFound(mnb.outpoint)))?;

    if utxo.value != ctx.params.collateral {
        return Err(Rejection::soft(RejectReason::WrongCollateralValue(
            utxo.value,
        )));
    }

    let need = ctx.params.min_collateral_confirmations;
    let tip = ctx.tip().unwrap_or(0);
    let have = (tip + 1).saturating_sub(utxo.height);
    if have < need {
        return Err(Rejection::soft(RejectReason::NotEnoughConfirmations {
            have,
            need,
        }));
    }
    debug!(outpoint = %mnb.outpoint, "collateral verified");

    if utxo.script != payee_script(&mnb.collateral_key) {
        return Err(Rejection::new(33, RejectReason::CollateralNotOwned));
    }

    // The announcement must not predate the block that gave the collateral
    // its minimum confirmations.
    let confirmed_at = utxo.height + need.saturating_sub(1);
    if let Some(block_time) = ctx.chain.block_time(confirmed_at) {
        if block_time > mnb.sig_time {
            return Err(Rejection::soft(RejectReason::SigTimeBeforeConfirmation));
        }
    }

    Ok(())
}
