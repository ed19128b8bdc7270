use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use activity_common::{AppError, FieldError};
use activity_reindex::{Progress, RunOptions, RunState};

/// Wire shape of `POST /reindex` (§4.5). `rateLimit == 0` means unlimited,
/// matching `BatchRateLimiter`'s own convention.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default)]
    pub rate_limit: u32,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub policy_names: Option<Vec<String>>,
    #[serde(default)]
    pub match_labels: Option<BTreeMap<String, String>>,
}

fn default_batch_size() -> i64 {
    500
}

impl RunRequest {
    pub fn into_options(self) -> Result<RunOptions, AppError> {
        if self.end_time <= self.start_time {
            return Err(AppError::validation(vec![FieldError::invalid(
                "endTime",
                "endTime must be after startTime",
            )]));
        }
        if self.batch_size <= 0 {
            return Err(AppError::validation(vec![FieldError::invalid(
                "batchSize",
                "batchSize must be positive",
            )]));
        }
        Ok(RunOptions {
            start_time: self.start_time,
            end_time: self.end_time,
            batch_size: self.batch_size,
            rate_limit: self.rate_limit,
            dry_run: self.dry_run,
            policy_names: self.policy_names,
            match_labels: self.match_labels,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub state: &'static str,
    pub progress: ProgressDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    pub processed_events: u64,
    pub activities_generated: u64,
    pub errors: u64,
    pub current_batch: u64,
}

pub fn state_label(state: RunState) -> &'static str {
    match state {
        RunState::Pending => "Pending",
        RunState::Running => "Running",
        RunState::Succeeded => "Succeeded",
        RunState::Failed => "Failed",
        RunState::Cancelled => "Cancelled",
    }
}

impl From<Progress> for ProgressDto {
    fn from(p: Progress) -> Self {
        Self {
            processed_events: p.processed_events,
            activities_generated: p.activities_generated,
            errors: p.errors,
            current_batch: p.current_batch,
        }
    }
}
