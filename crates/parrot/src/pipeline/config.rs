use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::queue::{Lanes, RetryPolicy};

/// Resolved runtime settings, derived once from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub work_directory: PathBuf,
    pub object_store_root: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub lanes: Lanes,
    pub retry: RetryPolicy,
    pub error_log_max_chars: usize,
    pub poll_interval: Duration,
    pub max_upload_bytes: u64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            database_path: config.database_path(),
            work_directory: PathBuf::from(&config.work_directory),
            object_store_root: PathBuf::from(&config.object_store.root),
            ffmpeg_bin: PathBuf::from(&config.ffmpeg_bin),
            lanes: config.lanes(),
            retry: config.retry_policy(),
            error_log_max_chars: config.error_log_max_chars,
            poll_interval: config.poll_interval(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
