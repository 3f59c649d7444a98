pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod worker;

pub use config::{load_config, load_config_or_default, Config};
pub use db::Database;
pub use error::{ConfigError, ImportError, ParrotError, Result, SchedulerError, StorageError, ToolError};
pub use import::import_file;
pub use pipeline::{
    trigger, ErrorKind, Pipeline, PipelineConfig, PipelineContext, PipelineError,
    RecordingStatus, TriggerOutcome,
};
pub use queue::{Lane, RetryPolicy, Scheduler, Stage};
pub use worker::{drain, JobOutcome, JobResult, WorkerPool};
