use crate::error::SyncError;
use std::fmt;

/// Sync stages, in the order they are requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncAsset {
    Failed,
    Initial,
    Sporks,
    List,
    Winners,
    Finished,
}

impl SyncAsset {
    pub fn id(&self) -> i32 {
        match self {
            Self::Failed => -1,
            Self::Initial => 0,
            Self::Sporks => 1,
            Self::List => 2,
            Self::Winners => 3,
            Self::Finished => 999,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Failed => "LMNODE_SYNC_FAILED",
            Self::Initial => "LMNODE_SYNC_INITIAL",
            Self::Sporks => "LMNODE_SYNC_SPORKS",
            Self::List => "LMNODE_SYNC_LIST",
            Self::Winners => "LMNODE_SYNC_MNW",
            Self::Finished => "LMNODE_SYNC_FINISHED",
        }
    }

    /// Human readable progress line.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Failed => "Synchronization failed",
            Self::Initial => "Synchronization pending...",
            Self::Sporks => "Synchronizing sporks...",
            Self::List => "Synchronizing lmnodes...",
            Self::Winners => "Synchronizing lmnode payments...",
            Self::Finished => "Synchronization finished",
        }
    }
}

impl TryFrom<i32> for SyncAsset {
    type Error = SyncError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            -1 => Ok(Self::Failed),
            0 => Ok(Self::Initial),
            1 => Ok(Self::Sporks),
            2 => Ok(Self::List),
            3 => Ok(Self::Winners),
            999 => Ok(Self::Finished),
            other => Err(SyncError::UnknownAsset(other)),
        }
    }
}

impl fmt::Display for SyncAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for asset in [
            SyncAsset::Failed,
            SyncAsset::Initial,
            SyncAsset::Sporks,
            SyncAsset::List,
            SyncAsset::Winners,
            SyncAsset::Finished,
        ] {
            assert_eq!(SyncAsset::try_from(asset.id()), Ok(asset));
        }
        assert_eq!(SyncAsset::try_from(4), Err(SyncError::UnknownAsset(4)));
    }

    #[test]
    fn order_follows_ids() {
        assert!(SyncAsset::Failed < SyncAsset::Initial);
        assert!(SyncAsset::List < SyncAsset::Winners);
        assert!(SyncAsset::Winners < SyncAsset::Finished);
    }
}
