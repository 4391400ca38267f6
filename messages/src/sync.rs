//! Sync progress reports.

use serde::{Deserialize, Serialize};

/// Which synchronised collection a `SyncStatusCount` refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncItem {
    List,
    Winners,
}

/// Sent after serving a list or payment sync request: how many items were announced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusCount {
    pub item: SyncItem,
    pub count: u32,
}
