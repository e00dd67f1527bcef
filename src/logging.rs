use std::fs::File;

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

/// Install the global tracing subscriber: stdout always, plus a file when
/// `log_to_file` is set. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Logging(format!("invalid level '{}': {}", config.level, e)))?;

    let stdout_appender = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true);

    let file_appender = if config.log_to_file {
        let file = File::create(&config.log_file_path).map_err(|e| {
            ConfigError::Logging(format!("unable to create {}: {}", config.log_file_path, e))
        })?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(file),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_appender)
        .with(stdout_appender)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
