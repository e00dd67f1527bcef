//! Configuration types for DIMSE services

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DimseError, Result};
use crate::MAX_AE_TITLE_LEN;

/// Configuration for the local end of a DIMSE association
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimseConfig {
    /// Local (calling) Application Entity Title
    pub local_aet: String,

    /// Maximum PDU size in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Association timeout in milliseconds
    #[serde(default = "default_association_timeout")]
    pub association_timeout_ms: u64,
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote (called) Application Entity Title
    pub ae_title: String,

    /// Remote host address
    pub host: String,

    /// Remote port
    pub port: u16,
}

impl Default for DimseConfig {
    fn default() -> Self {
        Self {
            local_aet: "FILESENDER".to_string(),
            max_pdu: default_max_pdu(),
            connect_timeout_ms: default_connect_timeout(),
            association_timeout_ms: default_association_timeout(),
        }
    }
}

impl DimseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get association timeout as Duration
    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.local_aet)?;

        if self.max_pdu < 16384 || self.max_pdu > 131072 {
            return Err(DimseError::config(
                "Max PDU size must be between 16384 and 131072 bytes",
            ));
        }

        if self.association_timeout_ms == 0 {
            return Err(DimseError::config("Association timeout must be greater than 0"));
        }

        Ok(())
    }
}

impl RemoteNode {
    /// Create a new remote node configuration
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
        }
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.ae_title)?;

        if self.host.is_empty() {
            return Err(DimseError::config("Remote host cannot be empty"));
        }

        if self.port == 0 {
            return Err(DimseError::config("Remote port must be greater than 0"));
        }

        Ok(())
    }
}

/// AE titles are 1-16 characters of the default character repertoire,
/// without backslash or control characters.
pub fn validate_ae_title(aet: &str) -> Result<()> {
    if aet.is_empty() || aet.len() > MAX_AE_TITLE_LEN {
        return Err(DimseError::InvalidAeTitle(format!(
            "'{}' must be 1-{} characters",
            aet, MAX_AE_TITLE_LEN
        )));
    }
    if aet.chars().any(|c| c == '\\' || c.is_control() || !c.is_ascii()) {
        return Err(DimseError::InvalidAeTitle(format!(
            "'{}' contains characters outside the default repertoire",
            aet
        )));
    }
    Ok(())
}

// Default value functions
fn default_max_pdu() -> u32 {
    16384
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_association_timeout() -> u64 {
    10_000 // 10 seconds
}
