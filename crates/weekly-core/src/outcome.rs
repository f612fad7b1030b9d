//! Per-user sweep outcomes.
//!
//! The reason vocabulary here is carried over verbatim from
//! `original_source/app/services/digest_job.py`'s `_process_user`, whose
//! outcome dicts use these exact strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSendTime,
    AlreadySent,
    InProgress,
    NoActivitySkip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentReason {
    EmailSent,
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    ContentGenerationFailed,
    RenderFailed,
    EmailSendFailed,
    UnexpectedError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserOutcome {
    Sent { user_id: Uuid, reason: SentReason },
    Skipped { user_id: Uuid, reason: SkipReason },
    Failed { user_id: Uuid, reason: FailReason, detail: String },
}

impl UserOutcome {
    pub fn user_id(&self) -> Uuid {
        match self {
            UserOutcome::Sent { user_id, .. } => *user_id,
            UserOutcome::Skipped { user_id, .. } => *user_id,
            UserOutcome::Failed { user_id, .. } => *user_id,
        }
    }
}

/// Aggregate result of one sweep, matching `run_sweep`'s return shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub processed: u64,
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl SweepSummary {
    pub fn record(&mut self, outcome: &UserOutcome) {
        self.processed += 1;
        match outcome {
            UserOutcome::Sent { .. } => self.sent += 1,
            UserOutcome::Skipped { .. } => self.skipped += 1,
            UserOutcome::Failed { detail, .. } => {
                self.failed += 1;
                self.errors.push(detail.clone());
            }
        }
    }
}
