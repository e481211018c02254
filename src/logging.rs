//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Result, TurnstileError};

/// Install the global tracing subscriber.
///
/// `RUST_LOG`, when set, takes precedence over the configured level. With
/// `add_source` every event also carries its file and line.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(config.add_source)
        .with_line_number(config.add_source);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| TurnstileError::Config(format!("Failed to install logger: {}", e)))
}

/// Build a filter from a level or directive string such as `debug` or
/// `turnstile=trace,info`.
pub fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| TurnstileError::Config(format!("Invalid log level '{}': {}", level, e)))
}
