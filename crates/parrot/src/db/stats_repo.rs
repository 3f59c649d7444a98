//! Aggregate counters over recordings, jobs, transcripts and tasks.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::queue::Lane;

use super::{job_repo, recording_repo, DatabaseError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub recordings: u64,
    pub recordings_by_status: BTreeMap<String, u64>,
    pub jobs_by_state: BTreeMap<String, u64>,
    pub heavy_jobs_by_state: BTreeMap<String, u64>,
    pub light_jobs_by_state: BTreeMap<String, u64>,
    pub transcripts: u64,
    pub tasks: u64,
}

pub fn collect(conn: &Connection) -> Result<PipelineStats, DatabaseError> {
    let recordings_by_status: BTreeMap<String, u64> = recording_repo::count_by_status(conn)?
        .into_iter()
        .map(|(status, n)| (status.to_string(), n))
        .collect();

    let by_state = |lane: Option<Lane>| -> Result<BTreeMap<String, u64>, DatabaseError> {
        Ok(job_repo::count_by_state(conn, lane)?
            .into_iter()
            .map(|(state, n)| (state.to_string(), n))
            .collect())
    };

    let transcripts: u64 = conn.query_row("SELECT COUNT(*) FROM transcripts", [], |r| r.get(0))?;
    let tasks: u64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |r| r.get(0))?;

    Ok(PipelineStats {
        recordings: recordings_by_status.values().sum(),
        recordings_by_status,
        jobs_by_state: by_state(None)?,
        heavy_jobs_by_state: by_state(Some(Lane::Heavy))?,
        light_jobs_by_state: by_state(Some(Lane::Light))?,
        transcripts,
        tasks,
    })
}
