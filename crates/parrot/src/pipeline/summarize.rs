//! Summarize stage: finalize the transcript and complete the pipeline.

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{recording_repo, transcript_repo};
use crate::queue::Stage;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::failure::record_failure;

/// Summary stored until a real summarization model is wired in.
pub const PLACEHOLDER_SUMMARY: &str = "Summary pending.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizeOutcome {
    /// False when an existing summary was kept.
    pub wrote_summary: bool,
}

pub fn summarize(
    ctx: &PipelineContext,
    recording_id: &str,
) -> Result<SummarizeOutcome, PipelineError> {
    record_failure(
        &ctx.db,
        recording_id,
        Stage::Summarize,
        ctx.config.error_log_max_chars,
        || run(ctx, recording_id),
    )
}

fn run(ctx: &PipelineContext, recording_id: &str) -> Result<SummarizeOutcome, PipelineError> {
    ctx.db
        .with_conn(|conn| recording_repo::find_status(conn, recording_id))?
        .ok_or_else(|| PipelineError::recording_not_found(recording_id))?;

    let transcript = ctx
        .db
        .with_conn(|conn| transcript_repo::find_by_recording(conn, recording_id))?
        .ok_or_else(|| PipelineError::transcript_not_found(recording_id))?;

    let wrote_summary = transcript.summary_is_blank();
    if wrote_summary {
        ctx.db.with_conn(|conn| {
            transcript_repo::set_summary(conn, recording_id, PLACEHOLDER_SUMMARY)
        })?;
    } else {
        debug!("Keeping existing summary");
    }

    ctx.db.with_conn(|conn| {
        recording_repo::set_summarized(conn, recording_id, Utc::now())?;
        recording_repo::mark_ready(conn, recording_id)
    })?;
    info!("Recording ready");

    Ok(SummarizeOutcome { wrote_summary })
}
