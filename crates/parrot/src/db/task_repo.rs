//! Action items extracted from a recording.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

use super::{format_time, opt_time_column, time_column, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(UnknownVariant::new("task status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub recording_id: String,
    pub title: String,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub status: TaskStatus,
    pub confidence: Option<f64>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl Task {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            recording_id: row.get("recording_id")?,
            title: row.get("title")?,
            assignee: row.get("assignee")?,
            due_date: opt_time_column(row, "due_date")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            confidence: row.get("confidence")?,
            created_at: time_column(row, "created_at")?,
        })
    }
}

/// Fields of a task to be written. The id is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub title: &'a str,
    pub assignee: Option<&'a str>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<&'a str>,
    pub status: TaskStatus,
    pub confidence: Option<f64>,
}

pub fn insert(
    conn: &Connection,
    recording_id: &str,
    task: &NewTask<'_>,
    now: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO tasks
         (recording_id, title, assignee, due_date, priority, status, confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            recording_id,
            task.title,
            task.assignee,
            task.due_date.map(format_time),
            task.priority,
            task.status,
            task.confidence,
            format_time(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All tasks of a recording in insertion order. Unknown recordings have none.
pub fn list_for_recording(
    conn: &Connection,
    recording_id: &str,
) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE recording_id = ?1 ORDER BY id ASC")?;
    let tasks = stmt
        .query_map(params![recording_id], Task::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recording_repo::{self, Recording};
    use crate::db::Database;
    use crate::pipeline::RecordingStatus;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn recording(conn: &Connection, id: &str) -> Result<(), DatabaseError> {
        recording_repo::insert(
            conn,
            &Recording {
                id: id.to_string(),
                filename: "standup.m4a".to_string(),
                mime_type: "audio/mp4".to_string(),
                file_size: 10,
                sha256: "abc".to_string(),
                source_key: Some(format!("uploads/{}.m4a", id)),
                status: RecordingStatus::Ready,
                created_at: t0(),
                duration_sec: None,
                upload_completed_at: None,
                transcribed_at: None,
                summarized_at: None,
                tasks_extracted_at: None,
                error_log: None,
            },
        )
    }

    #[test]
    fn test_list_for_recording() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            recording(conn, "r1")?;
            recording(conn, "r2")?;
            insert(
                conn,
                "r1",
                &NewTask {
                    title: "Send the deck",
                    assignee: Some("Sam"),
                    due_date: Some(t0()),
                    priority: Some("high"),
                    status: TaskStatus::Todo,
                    confidence: Some(0.8),
                },
                t0(),
            )?;
            insert(
                conn,
                "r1",
                &NewTask {
                    title: "Book the room",
                    assignee: None,
                    due_date: None,
                    priority: None,
                    status: TaskStatus::Done,
                    confidence: None,
                },
                t0(),
            )?;
            insert(
                conn,
                "r2",
                &NewTask {
                    title: "Other meeting",
                    assignee: None,
                    due_date: None,
                    priority: None,
                    status: TaskStatus::Doing,
                    confidence: None,
                },
                t0(),
            )
            .map(|_| ())
        })
        .unwrap();

        let tasks = db
            .with_conn(|conn| list_for_recording(conn, "r1"))
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Send the deck");
        assert_eq!(tasks[0].due_date, Some(t0()));
        assert_eq!(tasks[1].status, TaskStatus::Done);

        let json = serde_json::to_value(&tasks[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": tasks[0].id,
                "recordingId": "r1",
                "title": "Send the deck",
                "assignee": "Sam",
                "dueDate": "2026-03-01T12:00:00Z",
                "priority": "high",
                "status": "todo",
                "confidence": 0.8,
            })
        );

        assert!(db
            .with_conn(|conn| list_for_recording(conn, "missing"))
            .unwrap()
            .is_empty());
    }
}
