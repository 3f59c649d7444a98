//! Durable two-lane job scheduler.
//!
//! Jobs live in the `jobs` table, so queued work survives restarts. Workers
//! claim due jobs under a lease equal to the lane's timeout budget; an
//! attempt still running when the lease runs out is reaped and counted as a
//! failed attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use rusqlite::Connection;

use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::SchedulerError;
use crate::pipeline::truncate_chars;

use super::job::{Chained, ClaimedJob, JobHandle, JobState, RetryDecision, Stage};
use super::lane::{Lane, Lanes};
use super::retry::RetryPolicy;

/// Longest error text kept on a job row.
pub const MAX_JOB_ERROR_CHARS: usize = 4000;

struct Waker {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Waker {
    fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }
}

/// A running job whose lease expired, with what the retry policy made of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedJob {
    pub job: ClaimedJob,
    pub decision: RetryDecision,
    pub error: String,
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    policy: Arc<RetryPolicy>,
    lanes: Lanes,
    heavy: Arc<Waker>,
    light: Arc<Waker>,
}

impl Scheduler {
    pub fn new(db: Database, policy: RetryPolicy, lanes: Lanes) -> Self {
        Self {
            db,
            policy: Arc::new(policy),
            lanes,
            heavy: Arc::new(Waker::new()),
            light: Arc::new(Waker::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    fn waker(&self, lane: Lane) -> &Waker {
        match lane {
            Lane::Heavy => &self.heavy,
            Lane::Light => &self.light,
        }
    }

    /// Submits `stage` for a recording on the stage's lane. Returns as soon
    /// as the job row is written.
    pub fn enqueue(&self, stage: Stage, recording_id: &str) -> Result<JobHandle, SchedulerError> {
        self.enqueue_at(stage, recording_id, Utc::now())
    }

    /// Like [`enqueue`](Self::enqueue), with the job due at `run_at`.
    pub fn enqueue_at(
        &self,
        stage: Stage,
        recording_id: &str,
        run_at: DateTime<Utc>,
    ) -> Result<JobHandle, SchedulerError> {
        let handle = self
            .db
            .with_conn(|conn| self.enqueue_with(conn, stage, recording_id, run_at))?;
        self.notify(handle.lane);
        Ok(handle)
    }

    /// Writes a queued job row on an existing connection or transaction.
    /// The caller wakes the lane with [`notify`](Self::notify) once the
    /// write is committed.
    pub fn enqueue_with(
        &self,
        conn: &Connection,
        stage: Stage,
        recording_id: &str,
        run_at: DateTime<Utc>,
    ) -> Result<JobHandle, DatabaseError> {
        let row = self.new_job_row(stage, recording_id, run_at);
        job_repo::insert(conn, &row)?;

        log::debug!(
            "Enqueued {} job {} for recording {} on {} lane",
            stage,
            row.id,
            recording_id,
            row.lane
        );

        Ok(JobHandle {
            id: row.id,
            stage,
            lane: row.lane,
            recording_id: row.recording_id,
            run_at: row.run_at,
        })
    }

    /// Enqueues `stage` for a recording unless a job of that stage is already
    /// queued or running, in which case that job is returned. With `after`,
    /// nothing is written once that attempt no longer owns its job.
    pub fn chain(
        &self,
        after: Option<&ClaimedJob>,
        stage: Stage,
        recording_id: &str,
    ) -> Result<Chained, SchedulerError> {
        let chained = self.db.with_transaction(|tx| {
            if let Some(job) = after {
                if !job_repo::owns_attempt(tx, &job.id, job.attempt)? {
                    return Ok(Chained::Superseded);
                }
            }
            if let Some(row) = job_repo::find_outstanding(tx, recording_id, stage)? {
                return Ok(Chained::Existing(JobHandle::from_row(&row)));
            }
            self.enqueue_with(tx, stage, recording_id, Utc::now())
                .map(Chained::Enqueued)
        })?;

        match &chained {
            Chained::Enqueued(handle) => self.notify(handle.lane),
            Chained::Existing(handle) => {
                log::debug!("Reusing outstanding {} job {}", stage, handle.id)
            }
            Chained::Superseded => log::warn!(
                "Not chaining {} for recording {}: attempt lost its lease",
                stage,
                recording_id
            ),
        }
        Ok(chained)
    }

    fn new_job_row(&self, stage: Stage, recording_id: &str, run_at: DateTime<Utc>) -> JobRow {
        let now = Utc::now();
        JobRow {
            id: uuid::Uuid::new_v4().to_string(),
            stage,
            recording_id: recording_id.to_string(),
            lane: stage.lane(),
            state: JobState::Queued,
            attempts: 0,
            max_attempts: self.policy.max_attempts,
            run_at,
            lease_expires_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Wakes one idle worker on `lane`. A pending wake-up is never lost, and
    /// extra ones collapse into it.
    pub fn notify(&self, lane: Lane) {
        let _ = self.waker(lane).tx.try_send(());
    }

    /// Parks the caller until the lane is notified or `timeout` passes.
    /// Returns true when woken by a notification.
    pub fn wait_for_work(&self, lane: Lane, timeout: Duration) -> bool {
        self.waker(lane).rx.recv_timeout(timeout).is_ok()
    }

    /// Claims the oldest due job on `lane` under a lease of the lane's
    /// timeout budget.
    pub fn claim_next(
        &self,
        lane: Lane,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, SchedulerError> {
        let lease_expires_at = now + to_chrono(self.lanes.get(lane).timeout);
        let row = self
            .db
            .with_transaction(|tx| job_repo::claim_next(tx, lane, now, lease_expires_at))?;
        Ok(row.as_ref().map(ClaimedJob::from_row))
    }

    /// Marks the attempt succeeded. Returns false if the attempt no longer
    /// owns the job.
    pub fn complete(&self, job: &ClaimedJob, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
        let done = self
            .db
            .with_conn(|conn| job_repo::mark_succeeded(conn, &job.id, job.attempt, now))?;
        if !done {
            log::warn!(
                "Job {} attempt {} finished after losing its lease",
                job.id,
                job.attempt
            );
        }
        Ok(done)
    }

    /// Records a failed attempt and applies the retry policy. Non-retryable
    /// failures end the job regardless of remaining attempts.
    pub fn fail(
        &self,
        job: &ClaimedJob,
        error: &str,
        retryable: bool,
        now: DateTime<Utc>,
    ) -> Result<RetryDecision, SchedulerError> {
        let error = truncate_chars(error, MAX_JOB_ERROR_CHARS);

        if retryable && self.policy.allows_retry_after(job.attempt) {
            let delay = self.policy.delay_after(job.attempt);
            let run_at = now + to_chrono(delay);
            let requeued = self.db.with_conn(|conn| {
                job_repo::reschedule(conn, &job.id, job.attempt, run_at, error, now)
            })?;
            if !requeued {
                return Ok(RetryDecision::Stale);
            }
            log::info!(
                "Job {} ({}) attempt {}/{} failed, retrying in {}s",
                job.id,
                job.stage,
                job.attempt,
                job.max_attempts,
                delay.as_secs()
            );
            Ok(RetryDecision::Retry { delay, run_at })
        } else {
            let dead = self
                .db
                .with_conn(|conn| job_repo::mark_dead(conn, &job.id, job.attempt, error, now))?;
            if !dead {
                return Ok(RetryDecision::Stale);
            }
            log::warn!(
                "Job {} ({}) is dead after {} attempt(s)",
                job.id,
                job.stage,
                job.attempt
            );
            Ok(RetryDecision::Exhausted {
                attempts: job.attempt,
            })
        }
    }

    /// Treats every running job whose lease expired as a failed attempt.
    pub fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<ReapedJob>, SchedulerError> {
        let expired = self.db.with_conn(|conn| job_repo::find_expired(conn, now))?;
        let mut reaped = Vec::with_capacity(expired.len());

        for row in expired {
            let job = ClaimedJob::from_row(&row);
            let timeout = self.lanes.get(job.lane).timeout;
            let message = format!(
                "{} job exceeded the {} lane timeout of {}s",
                job.stage,
                job.lane,
                timeout.as_secs()
            );
            let decision = self.fail(&job, &message, true, now)?;
            if decision != RetryDecision::Stale {
                reaped.push(ReapedJob {
                    job,
                    decision,
                    error: message,
                });
            }
        }

        Ok(reaped)
    }

    pub fn find(&self, job_id: &str) -> Result<Option<JobRow>, SchedulerError> {
        Ok(self.db.with_conn(|conn| job_repo::find_by_id(conn, job_id))?)
    }

    pub fn list(&self, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), SchedulerError> {
        Ok(self.db.with_conn(|conn| job_repo::query(conn, filter))?)
    }

    pub fn count_by_state(&self, lane: Option<Lane>) -> Result<Vec<(JobState, u64)>, SchedulerError> {
        Ok(self
            .db
            .with_conn(|conn| job_repo::count_by_state(conn, lane))?)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

impl JobHandle {
    pub(crate) fn from_row(row: &JobRow) -> Self {
        Self {
            id: row.id.clone(),
            stage: row.stage,
            lane: row.lane,
            recording_id: row.recording_id.clone(),
            run_at: row.run_at,
        }
    }
}

impl ClaimedJob {
    pub(crate) fn from_row(row: &JobRow) -> Self {
        Self {
            id: row.id.clone(),
            stage: row.stage,
            lane: row.lane,
            recording_id: row.recording_id.clone(),
            attempt: row.attempts,
            max_attempts: row.max_attempts,
            lease_expires_at: row.lease_expires_at.unwrap_or(row.updated_at),
        }
    }
}
