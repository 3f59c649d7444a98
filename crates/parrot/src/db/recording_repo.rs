//! Recording repository: reads and status writes for the `recordings` table.
//!
//! Functions take a plain `&Connection` so callers can compose them inside
//! `Database::with_conn` or `Database::with_transaction`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::pipeline::RecordingStatus;

use super::{format_time, opt_time_column, time_column, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub sha256: String,
    pub source_key: Option<String>,
    pub status: RecordingStatus,
    pub created_at: DateTime<Utc>,
    pub duration_sec: Option<i64>,
    pub upload_completed_at: Option<DateTime<Utc>>,
    pub transcribed_at: Option<DateTime<Utc>>,
    pub summarized_at: Option<DateTime<Utc>>,
    pub tasks_extracted_at: Option<DateTime<Utc>>,
    pub error_log: Option<String>,
}

impl Recording {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            file_size: row.get("file_size")?,
            sha256: row.get("sha256")?,
            source_key: row.get("source_key")?,
            status: row.get("status")?,
            created_at: time_column(row, "created_at")?,
            duration_sec: row.get("duration_sec")?,
            upload_completed_at: opt_time_column(row, "upload_completed_at")?,
            transcribed_at: opt_time_column(row, "transcribed_at")?,
            summarized_at: opt_time_column(row, "summarized_at")?,
            tasks_extracted_at: opt_time_column(row, "tasks_extracted_at")?,
            error_log: row.get("error_log")?,
        })
    }

    /// The object-store key, if present and non-blank.
    pub fn usable_source_key(&self) -> Option<&str> {
        self.source_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingFilter {
    pub status: Option<RecordingStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(conn: &Connection, recording: &Recording) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO recordings (id, filename, mime_type, file_size, sha256, source_key,
         status, created_at, duration_sec, upload_completed_at, transcribed_at,
         summarized_at, tasks_extracted_at, error_log)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            recording.id,
            recording.filename,
            recording.mime_type,
            recording.file_size,
            recording.sha256,
            recording.source_key,
            recording.status,
            format_time(recording.created_at),
            recording.duration_sec,
            recording.upload_completed_at.map(format_time),
            recording.transcribed_at.map(format_time),
            recording.summarized_at.map(format_time),
            recording.tasks_extracted_at.map(format_time),
            recording.error_log,
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Recording>, DatabaseError> {
    let recording = conn
        .query_row(
            "SELECT * FROM recordings WHERE id = ?1",
            params![id],
            Recording::from_row,
        )
        .optional()?;
    Ok(recording)
}

pub fn find_status(conn: &Connection, id: &str) -> Result<Option<RecordingStatus>, DatabaseError> {
    let status = conn
        .query_row(
            "SELECT status FROM recordings WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(status)
}

/// Rewrites a legacy status to `queued`. Returns whether a row changed.
pub fn normalize_legacy_status(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let legacy = RecordingStatus::LEGACY.map(RecordingStatus::as_str);
    let changed = conn.execute(
        "UPDATE recordings SET status = 'queued'
         WHERE id = ?1 AND status IN (?2, ?3, ?4, ?5)",
        params![id, legacy[0], legacy[1], legacy[2], legacy[3]],
    )?;
    Ok(changed > 0)
}

/// Moves an eligible recording (`queued` or `failed`) to `queued`.
/// Returns false when the current status blocks the trigger.
pub fn requeue_if_eligible(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE recordings SET status = 'queued'
         WHERE id = ?1 AND status IN ('queued', 'failed')",
        params![id],
    )?;
    Ok(changed > 0)
}

/// Enters `processing` and stamps `upload_completed_at` the first time.
pub fn mark_processing(
    conn: &Connection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE recordings SET status = 'processing',
         upload_completed_at = COALESCE(upload_completed_at, ?2)
         WHERE id = ?1",
        params![id, format_time(now)],
    )?;
    Ok(changed > 0)
}

pub fn set_duration(conn: &Connection, id: &str, duration_sec: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE recordings SET duration_sec = ?2 WHERE id = ?1",
        params![id, duration_sec],
    )?;
    Ok(())
}

pub fn set_transcribed(
    conn: &Connection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE recordings SET transcribed_at = ?2 WHERE id = ?1",
        params![id, format_time(now)],
    )?;
    Ok(())
}

pub fn set_summarized(
    conn: &Connection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let now = format_time(now);
    conn.execute(
        "UPDATE recordings SET summarized_at = ?2, tasks_extracted_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}

pub fn mark_ready(conn: &Connection, id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE recordings SET status = 'ready' WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Sets `failed` and overwrites the diagnostic text.
pub fn mark_failed(conn: &Connection, id: &str, error_log: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE recordings SET status = 'failed', error_log = ?2 WHERE id = ?1",
        params![id, error_log],
    )?;
    Ok(changed > 0)
}

/// Lists recordings, newest first.
pub fn list(conn: &Connection, filter: &RecordingFilter) -> Result<Vec<Recording>, DatabaseError> {
    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;

    let rows = match filter.status {
        Some(status) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM recordings WHERE status = ?1
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![status, limit, offset], Recording::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT * FROM recordings ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(params![limit, offset], Recording::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn count_by_status(conn: &Connection) -> Result<Vec<(RecordingStatus, u64)>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM recordings GROUP BY status ORDER BY status")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
