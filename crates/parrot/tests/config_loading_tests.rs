//! Config file loading and environment overrides.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

use common::ConfigJsonBuilder;
use parrot::config::loader::{ENV_DATABASE_PATH, ENV_FFMPEG_BIN, ENV_MAX_UPLOAD_BYTES};
use parrot::config::{load_config, load_config_or_default};
use parrot::{ConfigError, PipelineConfig};

struct EnvGuard {
    names: Vec<&'static str>,
}

impl EnvGuard {
    fn set(pairs: &[(&'static str, &str)]) -> Self {
        for (name, value) in pairs {
            std::env::set_var(name, value);
        }
        Self {
            names: pairs.iter().map(|(n, _)| *n).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in &self.names {
            std::env::remove_var(name);
        }
    }
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("parrot.json");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_config_file_feeds_pipeline_config() {
    let dir = TempDir::new().unwrap();
    let content = ConfigJsonBuilder::new()
        .set("database_path", json!("/data/parrot.db"))
        .set("object_store", json!({ "root": "/data/bucket" }))
        .set("poll_interval_ms", json!(250))
        .lane("light", 90, 3)
        .build();
    let path = write_config(&dir, &content);

    let config = load_config_or_default(Some(&path)).unwrap();
    let pipeline = PipelineConfig::from_config(&config);

    assert_eq!(pipeline.database_path, PathBuf::from("/data/parrot.db"));
    assert_eq!(pipeline.object_store_root, PathBuf::from("/data/bucket"));
    assert_eq!(pipeline.poll_interval, Duration::from_millis(250));
    assert_eq!(pipeline.lanes.light.timeout, Duration::from_secs(90));
    assert_eq!(pipeline.lanes.light.workers, 3);
    assert_eq!(pipeline.lanes.heavy.timeout, Duration::from_secs(1200));
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let content = ConfigJsonBuilder::new()
        .set("ffmpeg_bin", json!("/opt/ffmpeg"))
        .build();
    let path = write_config(&dir, &content);

    let _env = EnvGuard::set(&[
        (ENV_DATABASE_PATH, "/tmp/override.db"),
        (ENV_FFMPEG_BIN, "/usr/bin/ffmpeg"),
        (ENV_MAX_UPLOAD_BYTES, "1024"),
    ]);
    let config = load_config_or_default(Some(&path)).unwrap();

    assert_eq!(config.database_path.as_deref(), Some("/tmp/override.db"));
    assert_eq!(config.ffmpeg_bin, "/usr/bin/ffmpeg");
    assert_eq!(config.max_upload_bytes, 1024);
}

#[test]
#[serial]
fn test_invalid_env_value_is_rejected() {
    let _env = EnvGuard::set(&[(ENV_MAX_UPLOAD_BYTES, "lots")]);
    let err = load_config_or_default(None).unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidEnv { name, ref value } if name == ENV_MAX_UPLOAD_BYTES && value == "lots")
    );
}

#[test]
#[serial]
fn test_defaults_without_file() {
    let config = load_config_or_default(None).unwrap();
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.backoff_secs, vec![60, 300, 1800]);
    assert_eq!(config.lanes.heavy.timeout_secs, 1200);
    assert_eq!(config.lanes.light.timeout_secs, 300);
}

#[test]
fn test_missing_file_reports_path() {
    let err = load_config("/nonexistent/parrot.json").unwrap_err();
    match err {
        ConfigError::ReadFile { path, .. } => {
            assert_eq!(path, PathBuf::from("/nonexistent/parrot.json"))
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_schema_errors_are_reported() {
    let dir = TempDir::new().unwrap();
    let content = ConfigJsonBuilder::new().lane("heavy", 0, 1).build();
    let path = write_config(&dir, &content);

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::SchemaValidation { .. }));
}
