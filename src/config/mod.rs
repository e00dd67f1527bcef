mod logging_config;
pub mod config;

pub use config::{Config, ConfigError, FilterConfig, TransmissionConfig};
pub use logging_config::LoggingConfig;
