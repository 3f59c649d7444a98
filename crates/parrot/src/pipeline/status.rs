//! Recording status state machine.
//!
//! One closed set holds both the pipeline states and the legacy symbols
//! written by the pre-pipeline upload path. Legacy values are read-only
//! inputs: [`RecordingStatus::normalize`] maps them to `Queued`, and it is
//! applied only at the trigger boundary. Stages never see them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Queued,
    Processing,
    Ready,
    Failed,
    // legacy
    Uploaded,
    Transcribed,
    Summarized,
    Error,
}

impl RecordingStatus {
    pub const LEGACY: [RecordingStatus; 4] = [
        RecordingStatus::Uploaded,
        RecordingStatus::Transcribed,
        RecordingStatus::Summarized,
        RecordingStatus::Error,
    ];

    /// States from which a trigger may enqueue the first stage.
    pub const ELIGIBLE: [RecordingStatus; 2] = [RecordingStatus::Queued, RecordingStatus::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingStatus::Queued => "queued",
            RecordingStatus::Processing => "processing",
            RecordingStatus::Ready => "ready",
            RecordingStatus::Failed => "failed",
            RecordingStatus::Uploaded => "uploaded",
            RecordingStatus::Transcribed => "transcribed",
            RecordingStatus::Summarized => "summarized",
            RecordingStatus::Error => "error",
        }
    }

    pub fn is_legacy(self) -> bool {
        Self::LEGACY.contains(&self)
    }

    /// Maps legacy symbols to `Queued`; pipeline states pass through.
    pub fn normalize(self) -> Self {
        if self.is_legacy() {
            RecordingStatus::Queued
        } else {
            self
        }
    }

    pub fn is_eligible(self) -> bool {
        Self::ELIGIBLE.contains(&self)
    }

    /// `processing` and `ready` block new triggers.
    pub fn blocks_trigger(self) -> bool {
        matches!(self, RecordingStatus::Processing | RecordingStatus::Ready)
    }

    /// Terminal until an external trigger re-queues the recording.
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordingStatus::Ready | RecordingStatus::Failed)
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RecordingStatus::Queued),
            "processing" => Ok(RecordingStatus::Processing),
            "ready" => Ok(RecordingStatus::Ready),
            "failed" => Ok(RecordingStatus::Failed),
            "uploaded" => Ok(RecordingStatus::Uploaded),
            "transcribed" => Ok(RecordingStatus::Transcribed),
            "summarized" => Ok(RecordingStatus::Summarized),
            "error" => Ok(RecordingStatus::Error),
            other => Err(UnknownVariant::new("recording status", other)),
        }
    }
}
