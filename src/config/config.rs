use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::LoggingConfig;
use crate::content_type::ContentTypeTable;
use crate::destination::Destination;
use crate::filter::{ExtensionFilter, FileFilter};
use crate::job::TransmissionOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid destination [{index}] '{destination}': {reason}")]
    InvalidDestination {
        index: usize,
        destination: String,
        reason: String,
    },

    #[error("No destination [{index}]; {count} configured")]
    UnknownDestination { index: usize, count: usize },

    #[error("{0} must be greater than 0")]
    InvalidTimeout(&'static str),

    #[error("Logging: {0}")]
    Logging(String),
}

/// Application configuration, normally read from `filesender.toml`
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Destinations offered to the user, in display order
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub transmission: TransmissionConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Extension to content type entries layered over the built-in table
    #[serde(default)]
    pub content_types: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransmissionConfig {
    #[serde(default = "default_true")]
    pub recurse_subdirectories: bool,
    #[serde(default = "default_true")]
    pub expand_archives: bool,
    #[serde(default = "default_true")]
    pub force_content_type: bool,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_association_timeout")]
    pub dicom_association_timeout_ms: u64,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            recurse_subdirectories: true,
            expand_archives: true,
            force_content_type: true,
            http_timeout_ms: default_http_timeout(),
            accept_invalid_certs: true,
            dicom_association_timeout_ms: default_association_timeout(),
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

impl Config {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, destination) in self.destinations.iter().enumerate() {
            Destination::parse(destination).map_err(|e| ConfigError::InvalidDestination {
                index,
                destination: destination.clone(),
                reason: e.to_string(),
            })?;
        }
        if self.transmission.http_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("transmission.http_timeout_ms"));
        }
        if self.transmission.dicom_association_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "transmission.dicom_association_timeout_ms",
            ));
        }
        if self.logging.log_to_file && self.logging.log_file_path.trim().is_empty() {
            return Err(ConfigError::Logging(
                "log_file_path is required when log_to_file is set".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured destination at `index`
    pub fn destination(&self, index: usize) -> Result<Destination, ConfigError> {
        let raw = self
            .destinations
            .get(index)
            .ok_or(ConfigError::UnknownDestination {
                index,
                count: self.destinations.len(),
            })?;
        Destination::parse(raw).map_err(|e| ConfigError::InvalidDestination {
            index,
            destination: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Job options with the configured content-type overrides applied
    pub fn transmission_options(&self) -> TransmissionOptions {
        let table = ContentTypeTable::builtin().with_overrides(&self.content_types);
        TransmissionOptions {
            recurse_subdirectories: self.transmission.recurse_subdirectories,
            expand_archives: self.transmission.expand_archives,
            force_content_type: self.transmission.force_content_type,
            http_timeout: Duration::from_millis(self.transmission.http_timeout_ms),
            accept_invalid_certs: self.transmission.accept_invalid_certs,
            dicom_association_timeout: Duration::from_millis(
                self.transmission.dicom_association_timeout_ms,
            ),
            content_types: Some(Arc::new(table)),
            temp_dir: self.transmission.temp_dir.clone(),
        }
    }

    pub fn file_filter(&self) -> Arc<dyn FileFilter> {
        Arc::new(ExtensionFilter::new(&self.filter.extensions))
    }
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    5_000
}

fn default_association_timeout() -> u64 {
    10_000
}

fn default_extensions() -> Vec<String> {
    vec!["*".to_string()]
}
