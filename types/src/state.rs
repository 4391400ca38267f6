//! Masternode activity states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The activity state of a masternode record, as recomputed by `check()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasternodeState {
    /// Announced but not yet pinged long enough after its announcement.
    PreEnabled,
    /// Live and eligible for payment.
    Enabled,
    /// No ping within the expiration window.
    Expired,
    /// Collateral has been spent. Terminal.
    OutpointSpent,
    /// Protocol version below the network minimum.
    UpdateRequired,
    /// No watchdog vote within the watchdog window while the watchdog is active.
    WatchdogExpired,
    /// No ping for so long that a fresh announcement is needed.
    NewStartRequired,
    /// Proof-of-service ban score reached the maximum.
    PoseBan,
}

impl MasternodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreEnabled => "PRE_ENABLED",
            Self::Enabled => "ENABLED",
            Self::Expired => "EXPIRED",
            Self::OutpointSpent => "OUTPOINT_SPENT",
            Self::UpdateRequired => "UPDATE_REQUIRED",
            Self::WatchdogExpired => "WATCHDOG_EXPIRED",
            Self::NewStartRequired => "NEW_START_REQUIRED",
            Self::PoseBan => "POSE_BAN",
        }
    }

    /// Whether a node in this state may be (re)started from its existing announcement.
    pub fn is_valid_for_auto_start(&self) -> bool {
        matches!(
            self,
            Self::Enabled | Self::PreEnabled | Self::Expired | Self::WatchdogExpired
        )
    }

    /// Whether a node in this state can accept a new ping.
    pub fn is_valid_for_ping(&self) -> bool {
        matches!(
            self,
            Self::Enabled | Self::PreEnabled | Self::Expired | Self::WatchdogExpired
        )
    }

    pub fn is_valid_for_payment(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for MasternodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
