use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info_span};

use crate::queue::{ClaimedJob, Stage};
use crate::worker::result::{JobOutcome, JobResult};

use super::context::PipelineContext;
use super::error::PipelineError;
use super::summarize::{summarize, SummarizeOutcome};
use super::transcribe::{transcribe_claimed, TranscribeOutcome};

#[derive(Debug, Clone)]
pub enum StageReport {
    Transcribed(TranscribeOutcome),
    Summarized(SummarizeOutcome),
}

/// Dispatches claimed jobs to their stage and reports the result back to
/// the scheduler.
#[derive(Clone)]
pub struct Pipeline {
    ctx: PipelineContext,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Runs the job's stage once, without touching the job row.
    pub fn run_stage(&self, job: &ClaimedJob) -> Result<StageReport, PipelineError> {
        let _stage_span = info_span!("stage",
            stage = %job.stage,
            recording_id = %job.recording_id,
            job_id = %job.id,
            attempt = job.attempt,
        )
        .entered();

        match job.stage {
            Stage::Transcribe => transcribe_claimed(&self.ctx, job).map(StageReport::Transcribed),
            Stage::Summarize => summarize(&self.ctx, &job.recording_id).map(StageReport::Summarized),
        }
    }

    /// Runs the job's stage and records the outcome: `complete` on success,
    /// `fail` (and with it the retry policy) on error.
    pub fn run(&self, job: &ClaimedJob) -> JobResult {
        let started = Instant::now();
        let stage_result = self.run_stage(job);
        let elapsed = started.elapsed();
        let now = Utc::now();

        match stage_result {
            Ok(report) => {
                debug!(job_id = %job.id, ?report, "Stage finished");
                let outcome = match self.ctx.scheduler.complete(job, now) {
                    Ok(true) => JobOutcome::Succeeded,
                    Ok(false) => JobOutcome::Stale,
                    Err(e) => {
                        error!(job_id = %job.id, "Failed to record job success: {}", e);
                        JobOutcome::Unrecorded
                    }
                };
                JobResult::new(job, outcome, None, elapsed)
            }
            Err(err) => {
                let message = err.to_string();
                let outcome =
                    match self
                        .ctx
                        .scheduler
                        .fail(job, &message, err.is_retryable(), now)
                    {
                        Ok(decision) => JobOutcome::from(decision),
                        Err(e) => {
                            error!(job_id = %job.id, "Failed to record job failure: {}", e);
                            JobOutcome::Unrecorded
                        }
                    };
                JobResult::new(job, outcome, Some(message), elapsed)
            }
        }
    }
}
