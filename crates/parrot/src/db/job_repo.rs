//! Job repository: the durable queue behind the scheduler.
//!
//! State changes on a running job are conditional on the attempt number, so
//! a worker whose lease was reaped cannot overwrite the outcome of a newer
//! attempt.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::queue::{JobState, Lane, Stage};

use super::{format_time, opt_time_column, time_column, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub id: String,
    pub stage: Stage,
    pub recording_id: String,
    pub lane: Lane,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub run_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            stage: row.get("stage")?,
            recording_id: row.get("recording_id")?,
            lane: row.get("lane")?,
            state: row.get("state")?,
            attempts: row.get("attempts")?,
            max_attempts: row.get("max_attempts")?,
            run_at: time_column(row, "run_at")?,
            lease_expires_at: opt_time_column(row, "lease_expires_at")?,
            last_error: row.get("last_error")?,
            created_at: time_column(row, "created_at")?,
            updated_at: time_column(row, "updated_at")?,
            finished_at: opt_time_column(row, "finished_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub lane: Option<Lane>,
    pub stage: Option<Stage>,
    pub recording_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, stage, recording_id, lane, state, attempts, max_attempts,
         run_at, lease_expires_at, last_error, created_at, updated_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            job.id,
            job.stage,
            job.recording_id,
            job.lane,
            job.state,
            job.attempts,
            job.max_attempts,
            format_time(job.run_at),
            job.lease_expires_at.map(format_time),
            job.last_error,
            format_time(job.created_at),
            format_time(job.updated_at),
            job.finished_at.map(format_time),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let job = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    Ok(job)
}

/// The oldest queued or running job of `stage` for a recording.
pub fn find_outstanding(
    conn: &Connection,
    recording_id: &str,
    stage: Stage,
) -> Result<Option<JobRow>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT * FROM jobs
             WHERE recording_id = ?1 AND stage = ?2 AND state IN ('queued', 'running')
             ORDER BY created_at ASC LIMIT 1",
            params![recording_id, stage],
            JobRow::from_row,
        )
        .optional()?;
    Ok(job)
}

/// The oldest queued or running job of any stage for a recording.
pub fn find_any_outstanding(
    conn: &Connection,
    recording_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT * FROM jobs
             WHERE recording_id = ?1 AND state IN ('queued', 'running')
             ORDER BY created_at ASC LIMIT 1",
            params![recording_id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(job)
}

/// True while `attempt` is still the running attempt of the job.
pub fn owns_attempt(conn: &Connection, id: &str, attempt: u32) -> Result<bool, DatabaseError> {
    let owned: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM jobs WHERE id = ?1 AND state = 'running' AND attempts = ?2",
            params![id, attempt],
            |r| r.get(0),
        )
        .optional()?;
    Ok(owned.is_some())
}

/// Moves the oldest due queued job on `lane` to `running` and bumps its
/// attempt counter. Call inside a transaction.
pub fn claim_next(
    conn: &Connection,
    lane: Lane,
    now: DateTime<Utc>,
    lease_expires_at: DateTime<Utc>,
) -> Result<Option<JobRow>, DatabaseError> {
    let now = format_time(now);
    let candidate: Option<String> = conn
        .query_row(
            "SELECT id FROM jobs
             WHERE lane = ?1 AND state = 'queued' AND run_at <= ?2
             ORDER BY run_at ASC, created_at ASC LIMIT 1",
            params![lane, now],
            |r| r.get(0),
        )
        .optional()?;

    let Some(id) = candidate else {
        return Ok(None);
    };

    let changed = conn.execute(
        "UPDATE jobs SET state = 'running', attempts = attempts + 1,
         lease_expires_at = ?2, updated_at = ?3
         WHERE id = ?1 AND state = 'queued'",
        params![id, format_time(lease_expires_at), now],
    )?;
    if changed == 0 {
        return Ok(None);
    }

    find_by_id(conn, &id)
}

pub fn mark_succeeded(
    conn: &Connection,
    id: &str,
    attempt: u32,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let now = format_time(now);
    let changed = conn.execute(
        "UPDATE jobs SET state = 'succeeded', lease_expires_at = NULL,
         updated_at = ?3, finished_at = ?3
         WHERE id = ?1 AND state = 'running' AND attempts = ?2",
        params![id, attempt, now],
    )?;
    Ok(changed > 0)
}

/// Puts a failed attempt back in the queue to run again at `run_at`.
pub fn reschedule(
    conn: &Connection,
    id: &str,
    attempt: u32,
    run_at: DateTime<Utc>,
    error: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET state = 'queued', run_at = ?3, lease_expires_at = NULL,
         last_error = ?4, updated_at = ?5
         WHERE id = ?1 AND state = 'running' AND attempts = ?2",
        params![id, attempt, format_time(run_at), error, format_time(now)],
    )?;
    Ok(changed > 0)
}

pub fn mark_dead(
    conn: &Connection,
    id: &str,
    attempt: u32,
    error: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let now = format_time(now);
    let changed = conn.execute(
        "UPDATE jobs SET state = 'dead', lease_expires_at = NULL, last_error = ?3,
         updated_at = ?4, finished_at = ?4
         WHERE id = ?1 AND state = 'running' AND attempts = ?2",
        params![id, attempt, error, now],
    )?;
    Ok(changed > 0)
}

/// Running jobs whose lease ran out at or before `now`.
pub fn find_expired(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM jobs
         WHERE state = 'running' AND lease_expires_at IS NOT NULL AND lease_expires_at <= ?1
         ORDER BY lease_expires_at ASC",
    )?;
    let rows = stmt
        .query_map(params![format_time(now)], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(conn: &Connection, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(state) = filter.state {
        conditions.push(format!("state = ?{}", param_values.len() + 1));
        param_values.push(Box::new(state));
    }
    if let Some(lane) = filter.lane {
        conditions.push(format!("lane = ?{}", param_values.len() + 1));
        param_values.push(Box::new(lane));
    }
    if let Some(stage) = filter.stage {
        conditions.push(format!("stage = ?{}", param_values.len() + 1));
        param_values.push(Box::new(stage));
    }
    if let Some(ref recording_id) = filter.recording_id {
        conditions.push(format!("recording_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(recording_id.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows: Vec<JobRow> = stmt
        .query_map(params_ref.as_slice(), JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Job counts per state, optionally restricted to one lane.
pub fn count_by_state(
    conn: &Connection,
    lane: Option<Lane>,
) -> Result<Vec<(JobState, u64)>, DatabaseError> {
    let rows = match lane {
        Some(lane) => {
            let mut stmt = conn.prepare(
                "SELECT state, COUNT(*) FROM jobs WHERE lane = ?1 GROUP BY state ORDER BY state",
            )?;
            let rows = stmt
                .query_map(params![lane], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt =
                conn.prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state ORDER BY state")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}
