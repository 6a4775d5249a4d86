use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub in_progress: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub pages: u32,
    pub records: usize,
    pub upserted: u64,
    pub removed: u64,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Another sync holds the guard.
    AlreadyRunning,
    /// The last success was on the same calendar day; nothing fetched.
    Fresh { last_success_at: DateTime<Utc> },
    /// The user declined the download.
    Declined,
    Completed(SyncReport),
}
