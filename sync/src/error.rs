use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("can't switch to the next asset from failed, reset first")]
    SwitchFromFailed,

    #[error("unknown sync asset {0}")]
    UnknownAsset(i32),
}
