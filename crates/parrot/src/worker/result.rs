use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::queue::{ClaimedJob, Lane, ReapedJob, RetryDecision, Stage};

/// What happened to a job after one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum JobOutcome {
    Succeeded,
    #[serde(rename_all = "camelCase")]
    Retrying {
        delay_secs: u64,
        run_at: DateTime<Utc>,
    },
    Dead {
        attempts: u32,
    },
    /// The attempt lost its lease before reporting.
    Stale,
    /// The outcome could not be written; the lease reaper will settle it.
    Unrecorded,
}

impl From<RetryDecision> for JobOutcome {
    fn from(decision: RetryDecision) -> Self {
        match decision {
            RetryDecision::Retry { delay, run_at } => JobOutcome::Retrying {
                delay_secs: delay.as_secs(),
                run_at,
            },
            RetryDecision::Exhausted { attempts } => JobOutcome::Dead { attempts },
            RetryDecision::Stale => JobOutcome::Stale,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: String,
    pub stage: Stage,
    pub lane: Lane,
    pub recording_id: String,
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobResult {
    pub fn new(
        job: &ClaimedJob,
        outcome: JobOutcome,
        error: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            stage: job.stage,
            lane: job.lane,
            recording_id: job.recording_id.clone(),
            attempt: job.attempt,
            outcome,
            error,
            elapsed,
        }
    }

    /// Result for a job whose lease ran out before its worker reported.
    pub fn reaped(reaped: &ReapedJob) -> Self {
        Self::new(
            &reaped.job,
            JobOutcome::from(reaped.decision.clone()),
            Some(reaped.error.clone()),
            Duration::ZERO,
        )
    }

    pub fn success(&self) -> bool {
        self.outcome == JobOutcome::Succeeded
    }
}
