use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

use super::lane::Lane;

/// One discrete unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Transcribe,
    Summarize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Transcribe => "transcribe",
            Stage::Summarize => "summarize",
        }
    }

    /// The lane every job of this stage is submitted to.
    pub fn lane(self) -> Lane {
        match self {
            Stage::Transcribe => Lane::Heavy,
            Stage::Summarize => Lane::Light,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(Stage::Transcribe),
            "summarize" => Ok(Stage::Summarize),
            other => Err(UnknownVariant::new("stage", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for `run_at`.
    Queued,
    /// Claimed by a worker under a lease.
    Running,
    Succeeded,
    /// Out of attempts, or failed with a non-retryable error.
    Dead,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Dead => "dead",
        }
    }

    pub fn is_outstanding(self) -> bool {
        matches!(self, JobState::Queued | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "succeeded" => Ok(JobState::Succeeded),
            "dead" => Ok(JobState::Dead),
            other => Err(UnknownVariant::new("job state", other)),
        }
    }
}

/// Returned by enqueue. The id is opaque and only meant for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub id: String,
    pub stage: Stage,
    pub lane: Lane,
    pub recording_id: String,
    pub run_at: DateTime<Utc>,
}

/// Result of [`Scheduler::chain`](super::Scheduler::chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chained {
    Enqueued(JobHandle),
    /// A job of the stage was already queued or running.
    Existing(JobHandle),
    /// The chaining attempt lost its job to the reaper; nothing was written.
    Superseded,
}

impl Chained {
    pub fn handle(&self) -> Option<&JobHandle> {
        match self {
            Chained::Enqueued(h) | Chained::Existing(h) => Some(h),
            Chained::Superseded => None,
        }
    }
}

/// A job a worker currently holds a lease on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub id: String,
    pub stage: Stage,
    pub lane: Lane,
    pub recording_id: String,
    /// 1-based attempt number of this execution.
    pub attempt: u32,
    pub max_attempts: u32,
    pub lease_expires_at: DateTime<Utc>,
}

/// What the scheduler decided after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        delay: Duration,
        run_at: DateTime<Utc>,
    },
    Exhausted {
        attempts: u32,
    },
    /// The attempt no longer owns the job (its lease was reaped).
    Stale,
}
