//! Transcript repository. At most one row per recording, enforced by the
//! unique index on `recording_id`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{format_time, time_column, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: i64,
    pub recording_id: String,
    pub text: String,
    pub summary: Option<String>,
    pub decisions: Vec<String>,
    pub questions: Vec<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            recording_id: row.get("recording_id")?,
            text: row.get("text")?,
            summary: row.get("summary")?,
            decisions: string_list(row.get("decisions")?),
            questions: string_list(row.get("questions")?),
            model: row.get("model")?,
            language: row.get("language")?,
            created_at: time_column(row, "created_at")?,
        })
    }

    /// True when there is no summary worth keeping.
    pub fn summary_is_blank(&self) -> bool {
        self.summary.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

/// Decodes a JSON-encoded string list. Malformed values read as empty.
fn string_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| match serde_json::from_str(&s) {
        Ok(list) => Some(list),
        Err(e) => {
            log::warn!("Ignoring malformed transcript list column: {}", e);
            None
        }
    })
    .unwrap_or_default()
}

pub fn find_by_recording(
    conn: &Connection,
    recording_id: &str,
) -> Result<Option<Transcript>, DatabaseError> {
    let transcript = conn
        .query_row(
            "SELECT * FROM transcripts WHERE recording_id = ?1",
            params![recording_id],
            Transcript::from_row,
        )
        .optional()?;
    Ok(transcript)
}

/// Returns the recording's transcript, creating it with `text` if absent.
/// An existing row is returned untouched.
pub fn find_or_create(
    conn: &Connection,
    recording_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Transcript, DatabaseError> {
    conn.execute(
        "INSERT INTO transcripts (recording_id, text, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(recording_id) DO NOTHING",
        params![recording_id, text, format_time(now)],
    )?;
    let transcript = conn.query_row(
        "SELECT * FROM transcripts WHERE recording_id = ?1",
        params![recording_id],
        Transcript::from_row,
    )?;
    Ok(transcript)
}

pub fn set_summary(conn: &Connection, recording_id: &str, summary: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE transcripts SET summary = ?2 WHERE recording_id = ?1",
        params![recording_id, summary],
    )?;
    Ok(())
}

pub fn count_for_recording(conn: &Connection, recording_id: &str) -> Result<u64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM transcripts WHERE recording_id = ?1",
        params![recording_id],
        |r| r.get(0),
    )?;
    Ok(count)
}
