//! Transcribe stage: stage the media, produce the transcript and chain the
//! summarize stage.

use chrono::Utc;
use tracing::{debug, info, info_span};

use crate::db::{recording_repo, transcript_repo};
use crate::queue::{ClaimedJob, JobHandle, Stage};

use super::context::PipelineContext;
use super::error::PipelineError;
use super::failure::record_failure;

/// Text stored until a real speech-to-text model is wired in.
pub const PLACEHOLDER_TRANSCRIPT: &str = "(transcription pending)";

#[derive(Debug, Clone)]
pub struct TranscribeOutcome {
    pub transcript_id: i64,
    pub duration_sec: i64,
    /// `None` when the attempt lost its job before chaining.
    pub summarize_job: Option<JobHandle>,
}

/// Runs the stage once. On failure the recording is marked `failed` and the
/// error is returned for the scheduler to act on.
pub fn transcribe(
    ctx: &PipelineContext,
    recording_id: &str,
) -> Result<TranscribeOutcome, PipelineError> {
    record_failure(
        &ctx.db,
        recording_id,
        Stage::Transcribe,
        ctx.config.error_log_max_chars,
        || run(ctx, recording_id, None),
    )
}

/// Runs the stage for a claimed job. The summarize stage is only chained
/// while the job's attempt still owns it.
pub fn transcribe_claimed(
    ctx: &PipelineContext,
    job: &ClaimedJob,
) -> Result<TranscribeOutcome, PipelineError> {
    record_failure(
        &ctx.db,
        &job.recording_id,
        Stage::Transcribe,
        ctx.config.error_log_max_chars,
        || run(ctx, &job.recording_id, Some(job)),
    )
}

fn run(
    ctx: &PipelineContext,
    recording_id: &str,
    attempt: Option<&ClaimedJob>,
) -> Result<TranscribeOutcome, PipelineError> {
    let recording = ctx
        .db
        .with_conn(|conn| recording_repo::find_by_id(conn, recording_id))?
        .ok_or_else(|| PipelineError::recording_not_found(recording_id))?;

    let key = recording
        .usable_source_key()
        .ok_or_else(|| PipelineError::Validation {
            field: "source_key",
            reason: "recording has no object-store key".to_string(),
        })?
        .to_string();

    ctx.db
        .with_conn(|conn| recording_repo::mark_processing(conn, recording_id, Utc::now()))?;

    // Both temp files live until the end of this function, whichever way
    // it returns.
    let media = {
        let _step = info_span!("download", key = %key).entered();
        ctx.stager.download(&key)?
    };

    let wav = {
        let _step = info_span!("transcode").entered();
        ctx.stager.transcode(&media)?
    };

    let info = ctx.stager.probe(&wav)?;
    let duration_sec = info.duration_sec();
    ctx.db
        .with_conn(|conn| recording_repo::set_duration(conn, recording_id, duration_sec))?;
    debug!(duration_sec, "Waveform ready");

    let transcript = {
        let _step = info_span!("transcript").entered();
        ctx.db.with_conn(|conn| {
            transcript_repo::find_or_create(conn, recording_id, PLACEHOLDER_TRANSCRIPT, Utc::now())
        })?
    };

    ctx.db
        .with_conn(|conn| recording_repo::set_transcribed(conn, recording_id, Utc::now()))?;

    let summarize_job = ctx
        .scheduler
        .chain(attempt, Stage::Summarize, recording_id)?
        .handle()
        .cloned();
    if let Some(job) = &summarize_job {
        info!(summarize_job = %job.id, "Transcribed recording, summarize stage queued");
    }

    drop(wav);
    drop(media);

    Ok(TranscribeOutcome {
        transcript_id: transcript.id,
        duration_sec,
        summarize_job,
    })
}
