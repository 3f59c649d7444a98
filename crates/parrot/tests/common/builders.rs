//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use chrono::Utc;
use serde_json::{json, Value};

use parrot::db::recording_repo::{self, Recording};
use parrot::db::Database;
use parrot::RecordingStatus;

/// Builder for `Recording` rows.
pub struct RecordingBuilder {
    id: String,
    filename: String,
    mime_type: String,
    source_key: Option<String>,
    status: RecordingStatus,
}

impl RecordingBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            filename: "memo.m4a".to_string(),
            mime_type: "audio/mp4".to_string(),
            source_key: Some(format!("uploads/2024/01/01/{}-memo.m4a", id)),
            status: RecordingStatus::Uploaded,
        }
    }

    pub fn status(mut self, status: RecordingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn source_key(mut self, key: Option<&str>) -> Self {
        self.source_key = key.map(str::to_string);
        self
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn build(self) -> Recording {
        Recording {
            id: self.id,
            filename: self.filename,
            mime_type: self.mime_type,
            file_size: 3,
            sha256: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_string(),
            source_key: self.source_key,
            status: self.status,
            created_at: Utc::now(),
            duration_sec: None,
            upload_completed_at: None,
            transcribed_at: None,
            summarized_at: None,
            tasks_extracted_at: None,
            error_log: None,
        }
    }

    pub fn insert(self, db: &Database) -> Recording {
        let recording = self.build();
        db.with_conn(|conn| recording_repo::insert(conn, &recording))
            .expect("Failed to insert recording");
        recording
    }
}

/// Builder for config file contents.
pub struct ConfigJsonBuilder {
    value: Value,
}

impl ConfigJsonBuilder {
    pub fn new() -> Self {
        Self {
            value: json!({ "version": "1.0" }),
        }
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.value[key] = value;
        self
    }

    pub fn lane(mut self, lane: &str, timeout_secs: u64, workers: usize) -> Self {
        if self.value.get("lanes").is_none() {
            self.value["lanes"] = json!({});
        }
        self.value["lanes"][lane] = json!({ "timeout_secs": timeout_secs, "workers": workers });
        self
    }

    pub fn build(self) -> String {
        serde_json::to_string_pretty(&self.value).expect("Failed to serialize config")
    }
}

impl Default for ConfigJsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
