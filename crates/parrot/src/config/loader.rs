use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Environment variables that override file values after loading.
pub const ENV_DATABASE_PATH: &str = "PARROT_DATABASE_PATH";
pub const ENV_FFMPEG_BIN: &str = "FFMPEG_BIN";
pub const ENV_MAX_UPLOAD_BYTES: &str = "PARROT_MAX_UPLOAD_BYTES";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` when given, otherwise starts from defaults. Environment
/// overrides are applied either way and the result is validated again.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies the supported overrides, reading variables through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.trim().is_empty()) {
        config.database_path = Some(path);
    }
    if let Some(bin) = lookup(ENV_FFMPEG_BIN).filter(|v| !v.trim().is_empty()) {
        config.ffmpeg_bin = bin;
    }
    if let Some(raw) = lookup(ENV_MAX_UPLOAD_BYTES) {
        config.max_upload_bytes = raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidEnv {
                name: ENV_MAX_UPLOAD_BYTES,
                value: raw,
            })?;
    }
    Ok(())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != "1.0" {
        return invalid(format!("Unsupported config version: {}", config.version));
    }

    for (name, lane) in [("heavy", &config.lanes.heavy), ("light", &config.lanes.light)] {
        if lane.timeout_secs == 0 {
            return invalid(format!("{} lane timeout must be positive", name));
        }
        if lane.workers == 0 {
            return invalid(format!("{} lane needs at least one worker", name));
        }
    }

    if config.retry.max_attempts == 0 {
        return invalid("retry.max_attempts must be at least 1".to_string());
    }
    if config.retry.max_attempts > 1 && config.retry.backoff_secs.is_empty() {
        return invalid("retry.backoff_secs must not be empty when retries are enabled".to_string());
    }

    if config.error_log_max_chars == 0 {
        return invalid("error_log_max_chars must be positive".to_string());
    }
    if config.poll_interval_ms == 0 {
        return invalid("poll_interval_ms must be positive".to_string());
    }
    if config.max_upload_bytes == 0 {
        return invalid("max_upload_bytes must be positive".to_string());
    }
    if config.ffmpeg_bin.trim().is_empty() {
        return invalid("ffmpeg_bin must not be empty".to_string());
    }

    if config
        .logging
        .level
        .parse::<tracing::level_filters::LevelFilter>()
        .is_err()
    {
        return invalid(format!("Unknown log level: {}", config.logging.level));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::collections::HashMap;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/parrot/parrot.db",
            "work_directory": "/var/tmp/parrot",
            "object_store": { "root": "/srv/bucket" },
            "ffmpeg_bin": "/usr/local/bin/ffmpeg",
            "lanes": {
                "heavy": { "timeout_secs": 600, "workers": 1 },
                "light": { "timeout_secs": 120, "workers": 4 }
            },
            "retry": { "max_attempts": 5, "backoff_secs": [10, 20] },
            "error_log_max_chars": 500,
            "poll_interval_ms": 250,
            "max_upload_bytes": 1048576,
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.object_store.root, "/srv/bucket");
        assert_eq!(config.lanes.light.workers, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.lanes().light.timeout.as_secs(), 120);
    }

    #[test]
    fn test_schema_rejects_unknown_fields() {
        let err = load_config_from_str(r#"{ "version": "1.0", "workers": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_schema_rejects_bad_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_schema_rejects_zero_attempts() {
        let err =
            load_config_from_str(r#"{ "version": "1.0", "retry": { "max_attempts": 0 } }"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/parrot.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_validate_config_rejects_zero_workers() {
        let mut config = Config::default();
        config.lanes.light.workers = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_PATH, "/tmp/override.db"),
            (ENV_FFMPEG_BIN, "/opt/ffmpeg"),
            (ENV_MAX_UPLOAD_BYTES, "2048"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/tmp/override.db"));
        assert_eq!(config.ffmpeg_bin, "/opt/ffmpeg");
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn test_invalid_upload_limit_override() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, |name| {
            (name == ENV_MAX_UPLOAD_BYTES).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| {
            (name == ENV_FFMPEG_BIN).then(|| "  ".to_string())
        })
        .unwrap();
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
    }
}
