use serde::Serialize;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{SchedulerError, StorageError, ToolError};

/// Everything a stage can fail with. The scheduler consults
/// [`PipelineError::is_retryable`] to decide between a retry and a dead job.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Transcoding failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Scheduling failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Storage,
    Tool,
    Unknown,
}

impl PipelineError {
    pub fn recording_not_found(id: &str) -> Self {
        PipelineError::NotFound {
            entity: "Recording",
            id: id.to_string(),
        }
    }

    pub fn transcript_not_found(recording_id: &str) -> Self {
        PipelineError::NotFound {
            entity: "Transcript for recording",
            id: recording_id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound { .. } => ErrorKind::NotFound,
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::Storage(StorageError::InvalidKey { .. }) => ErrorKind::Validation,
            PipelineError::Storage(_) => ErrorKind::Storage,
            PipelineError::Tool(_) => ErrorKind::Tool,
            PipelineError::Database(_) | PipelineError::Scheduler(_) | PipelineError::Io(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// NotFound and Validation failures will not go away by waiting.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Validation)
    }
}
