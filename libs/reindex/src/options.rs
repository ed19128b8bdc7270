use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Parameters for one re-index run. `policy_names`/`match_labels` narrow
/// which currently-served policies participate; an empty resulting
/// selection is a no-op success, not an error.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub batch_size: i64,
    /// Events per second; `0` means unlimited.
    pub rate_limit: u32,
    pub dry_run: bool,
    pub policy_names: Option<Vec<String>>,
    pub match_labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub processed_events: u64,
    pub activities_generated: u64,
    pub errors: u64,
    pub current_batch: u64,
    pub total_batches: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub progress: Progress,
}
