//! Trigger entry point: decides whether a recording may start the pipeline
//! and, if so, enqueues the transcribe stage.
//!
//! Legacy statuses are normalized in their own committed write first. The
//! eligibility check and the enqueue then run in one immediate transaction,
//! so a recording never has more than one outstanding stage job, however
//! many triggers race for it.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span};

use crate::db::{job_repo, recording_repo};
use crate::queue::{JobHandle, Lane, Stage};

use super::context::PipelineContext;
use super::error::PipelineError;
use super::status::RecordingStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
    pub eligible: bool,
    pub status: RecordingStatus,
    pub job_id: Option<String>,
}

enum Decision {
    Blocked(RecordingStatus),
    Existing(RecordingStatus, Stage, String),
    Enqueued(JobHandle),
}

pub fn trigger(ctx: &PipelineContext, recording_id: &str) -> Result<TriggerOutcome, PipelineError> {
    let _span = info_span!("trigger", recording_id).entered();

    if ctx
        .db
        .with_conn(|conn| recording_repo::normalize_legacy_status(conn, recording_id))?
    {
        info!("Normalized legacy status to queued");
    }

    let decision = ctx.db.with_transaction(|tx| {
        let Some(status) = recording_repo::find_status(tx, recording_id)? else {
            return Ok(None);
        };
        if status.blocks_trigger() {
            return Ok(Some(Decision::Blocked(status)));
        }
        if let Some(job) = job_repo::find_any_outstanding(tx, recording_id)? {
            return Ok(Some(Decision::Existing(status, job.stage, job.id)));
        }
        if !recording_repo::requeue_if_eligible(tx, recording_id)? {
            return Ok(Some(Decision::Blocked(status)));
        }
        let handle =
            ctx.scheduler
                .enqueue_with(tx, Stage::Transcribe, recording_id, Utc::now())?;
        Ok(Some(Decision::Enqueued(handle)))
    })?;

    let outcome = match decision {
        None => return Err(PipelineError::recording_not_found(recording_id)),
        Some(Decision::Blocked(status)) => {
            info!(status = %status, "Trigger ignored");
            TriggerOutcome {
                eligible: false,
                status,
                job_id: None,
            }
        }
        Some(Decision::Existing(status, stage, job_id)) => {
            info!(job_id = %job_id, stage = %stage, "Stage job already outstanding");
            TriggerOutcome {
                eligible: true,
                status,
                job_id: Some(job_id),
            }
        }
        Some(Decision::Enqueued(handle)) => {
            ctx.scheduler.notify(Lane::Heavy);
            info!(job_id = %handle.id, "Transcribe job enqueued");
            TriggerOutcome {
                eligible: true,
                status: RecordingStatus::Queued,
                job_id: Some(handle.id),
            }
        }
    };

    Ok(outcome)
}
