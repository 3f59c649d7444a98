//! Burst mode: run every due job on the calling thread, then return.

use chrono::Utc;
use log::{info, warn};

use crate::error::SchedulerError;
use crate::pipeline::{mark_failed, Pipeline};
use crate::queue::Lane;
use crate::worker::result::JobResult;

/// Claims and runs due jobs on `lanes` until none is left. Jobs rescheduled
/// into the future by a failure are not waited for.
pub fn drain(pipeline: &Pipeline, lanes: &[Lane]) -> Result<Vec<JobResult>, SchedulerError> {
    let ctx = pipeline.context();
    let mut results = Vec::new();

    loop {
        for reaped in ctx.scheduler.reap_expired(Utc::now())? {
            warn!("Reaped job {}: {}", reaped.job.id, reaped.error);
            mark_failed(
                &ctx.db,
                &reaped.job.recording_id,
                &reaped.error,
                ctx.config.error_log_max_chars,
            );
            results.push(JobResult::reaped(&reaped));
        }

        let mut ran = false;
        for &lane in lanes {
            if let Some(job) = ctx.scheduler.claim_next(lane, Utc::now())? {
                results.push(pipeline.run(&job));
                ran = true;
            }
        }

        if !ran {
            break;
        }
    }

    info!("Burst finished after {} jobs", results.len());
    Ok(results)
}
