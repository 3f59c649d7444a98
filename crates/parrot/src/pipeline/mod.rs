pub mod config;
pub mod context;
pub mod error;
pub mod failure;
pub mod runner;
pub mod status;
pub mod summarize;
pub mod transcribe;
pub mod trigger;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{ErrorKind, PipelineError};
pub use failure::{mark_failed, record_failure, truncate_chars};
pub use runner::{Pipeline, StageReport};
pub use status::RecordingStatus;
pub use summarize::{summarize, SummarizeOutcome, PLACEHOLDER_SUMMARY};
pub use transcribe::{transcribe, transcribe_claimed, TranscribeOutcome, PLACEHOLDER_TRANSCRIPT};
pub use trigger::{trigger, TriggerOutcome};
