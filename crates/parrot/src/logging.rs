//! Process-wide tracing setup. Output goes to stderr so stdout stays free
//! for command results.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ParrotError;

/// Builds the level filter. `RUST_LOG`, when set, replaces the configured
/// level.
pub fn env_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, ParrotError> {
    let directives = rust_log.filter(|v| !v.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| ParrotError::Logging(e.to_string()))
}

/// Installs the global subscriber and routes `log` records into it.
pub fn init(config: &LoggingConfig) -> Result<(), ParrotError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(&config.level, rust_log.as_deref())?;

    let fmt_layer = match config.format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ParrotError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| ParrotError::Logging(e.to_string()))?;

    Ok(())
}
