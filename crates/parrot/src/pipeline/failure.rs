//! Failure recording shared by both stages.
//!
//! A stage body runs exactly once inside [`record_failure`]. On error the
//! recording is moved to `failed` with a truncated copy of the error text,
//! and the original error is handed back so the scheduler can apply its
//! retry policy.

use tracing::{error, warn};

use crate::db::{recording_repo, Database};
use crate::queue::Stage;

use super::error::PipelineError;

/// Returns at most `max` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Runs a stage body and records its failure on the recording.
pub fn record_failure<T, F>(
    db: &Database,
    recording_id: &str,
    stage: Stage,
    max_chars: usize,
    body: F,
) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError>,
{
    body().map_err(|err| {
        error!(
            stage = %stage,
            recording_id,
            kind = ?err.kind(),
            "Stage failed: {}",
            err
        );
        mark_failed(db, recording_id, &err.to_string(), max_chars);
        err
    })
}

/// Sets `failed` and the error log. Bookkeeping failures are logged and
/// swallowed so they never mask the error being recorded.
pub fn mark_failed(db: &Database, recording_id: &str, message: &str, max_chars: usize) {
    let text = truncate_chars(message, max_chars);
    match db.with_conn(|conn| recording_repo::mark_failed(conn, recording_id, text)) {
        Ok(true) => {}
        Ok(false) => warn!(recording_id, "Cannot record failure: recording is gone"),
        Err(e) => warn!(recording_id, "Failed to record failure: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recording_repo::Recording;
    use crate::pipeline::RecordingStatus;

    fn db_with(status: RecordingStatus) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            recording_repo::insert(
                conn,
                &Recording {
                    id: "r1".to_string(),
                    filename: "a.m4a".to_string(),
                    mime_type: "audio/mp4".to_string(),
                    file_size: 1,
                    sha256: "x".to_string(),
                    source_key: Some("uploads/a.m4a".to_string()),
                    status,
                    created_at: chrono::Utc::now(),
                    duration_sec: None,
                    upload_completed_at: None,
                    transcribed_at: None,
                    summarized_at: None,
                    tasks_extracted_at: None,
                    error_log: None,
                },
            )
        })
        .unwrap();
        db
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 3), "");
        // Multi-byte characters are never split.
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }

    #[test]
    fn test_success_leaves_status_alone() {
        let db = db_with(RecordingStatus::Processing);
        let out = record_failure(&db, "r1", Stage::Transcribe, 4000, || Ok(7)).unwrap();
        assert_eq!(out, 7);
        let rec = db
            .with_conn(|conn| recording_repo::find_by_id(conn, "r1"))
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, RecordingStatus::Processing);
        assert!(rec.error_log.is_none());
    }

    #[test]
    fn test_failure_sets_failed_and_truncated_log() {
        let db = db_with(RecordingStatus::Processing);
        let result: Result<(), _> = record_failure(&db, "r1", Stage::Summarize, 10, || {
            Err(PipelineError::Validation {
                field: "source_key",
                reason: "x".repeat(100),
            })
        });

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));

        let rec = db
            .with_conn(|conn| recording_repo::find_by_id(conn, "r1"))
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, RecordingStatus::Failed);
        assert_eq!(rec.error_log.as_deref(), Some("Invalid so"));
    }

    #[test]
    fn test_failure_on_missing_recording_still_returns_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<(), _> = record_failure(&db, "ghost", Stage::Transcribe, 4000, || {
            Err(PipelineError::recording_not_found("ghost"))
        });
        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }
}
