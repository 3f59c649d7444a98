use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::{LaneSettings, Lanes, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.parrot/data/parrot.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_work_directory")]
    pub work_directory: String,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    #[serde(default)]
    pub lanes: LanesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_error_log_max_chars")]
    pub error_log_max_chars: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn parrot_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".parrot")
}

fn default_work_directory() -> String {
    parrot_home().join("work").display().to_string()
}

fn default_object_store_root() -> String {
    parrot_home().join("objects").display().to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_error_log_max_chars() -> usize {
    4000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_upload_bytes() -> u64 {
    1_500_000_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            work_directory: default_work_directory(),
            object_store: ObjectStoreConfig::default(),
            ffmpeg_bin: default_ffmpeg_bin(),
            lanes: LanesConfig::default(),
            retry: RetryConfig::default(),
            error_log_max_chars: default_error_log_max_chars(),
            poll_interval_ms: default_poll_interval_ms(),
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(path),
            None => crate::db::default_database_path()
                .unwrap_or_else(|| parrot_home().join("data").join("parrot.db")),
        }
    }

    /// Lane settings with the heavy lane's worker count capped at the
    /// number of CPUs.
    pub fn lanes(&self) -> Lanes {
        Lanes {
            heavy: LaneSettings {
                timeout: Duration::from_secs(self.lanes.heavy.timeout_secs),
                workers: self.lanes.heavy.workers.min(num_cpus::get()).max(1),
            },
            light: LaneSettings {
                timeout: Duration::from_secs(self.lanes.light.timeout_secs),
                workers: self.lanes.light.workers.max(1),
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.retry.max_attempts, &self.retry.backoff_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default = "default_object_store_root")]
    pub root: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: default_object_store_root(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanesConfig {
    #[serde(default = "default_heavy_lane")]
    pub heavy: LaneConfig,
    #[serde(default = "default_light_lane")]
    pub light: LaneConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub timeout_secs: u64,
    pub workers: usize,
}

fn default_heavy_lane() -> LaneConfig {
    LaneConfig {
        timeout_secs: 20 * 60,
        workers: 1,
    }
}

fn default_light_lane() -> LaneConfig {
    LaneConfig {
        timeout_secs: 5 * 60,
        workers: 2,
    }
}

impl Default for LanesConfig {
    fn default() -> Self {
        Self {
            heavy: default_heavy_lane(),
            light: default_light_lane(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> Vec<u64> {
    vec![60, 300, 1800]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.error_log_max_chars, 4000);
        assert_eq!(config.max_upload_bytes, 1_500_000_000);
        assert_eq!(config.retry_policy(), RetryPolicy::default());

        let lanes = config.lanes();
        assert_eq!(lanes.heavy.timeout, Duration::from_secs(1200));
        assert_eq!(lanes.light.timeout, Duration::from_secs(300));
        assert_eq!(lanes.heavy.workers, 1);
        assert_eq!(lanes.light.workers, 2);
    }

    #[test]
    fn test_heavy_workers_capped_by_cpus() {
        let mut config = Config::default();
        config.lanes.heavy.workers = 10_000;
        assert!(config.lanes().heavy.workers <= num_cpus::get());
    }

    #[test]
    fn test_explicit_database_path() {
        let mut config = Config::default();
        config.database_path = Some("/tmp/p.db".to_string());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/p.db"));
    }
}
