//! Service Class User (SCU) implementation for outbound DIMSE operations

use std::path::{Path, PathBuf};
use std::time::Duration;

use dicom_dictionary_std::tags;
use dicom_object::OpenFileOptions;
use tracing::{debug, error, info};

use crate::config::{DimseConfig, RemoteNode};
use crate::types::{StoreMetadata, StoreStatus};
use crate::{DimseError, Result};

/// DCMTK exit codes in this range come from the network layer
/// (initialisation, negotiation, request transmission, release/abort).
const ASSOCIATION_EXIT_CODES: std::ops::RangeInclusive<i32> = 60..=79;

/// DIMSE Service Class User
#[derive(Debug, Clone)]
pub struct DimseScu {
    config: DimseConfig,
}

impl DimseScu {
    /// Create a new SCU with the given configuration
    pub fn new(config: DimseConfig) -> Self {
        Self { config }
    }

    /// Local configuration of this SCU
    pub fn config(&self) -> &DimseConfig {
        &self.config
    }

    /// Send one Part 10 file with C-STORE over a new association
    pub async fn store_file(&self, node: &RemoteNode, path: &Path) -> Result<StoreStatus> {
        info!(
            "Sending C-STORE of {} to {}@{}:{}",
            path.display(),
            node.ae_title,
            node.host,
            node.port
        );

        node.validate()?;
        self.config.validate()?;

        let metadata = read_store_metadata(path.to_path_buf()).await?;
        debug!(
            "C-STORE dataset: sop_class={}, sop_instance={}, transfer_syntax={}",
            metadata.sop_class_uid, metadata.sop_instance_uid, metadata.transfer_syntax
        );

        #[cfg(feature = "dcmtk_cli")]
        {
            let mut cmd = tokio::process::Command::new("storescu");
            cmd.arg("-aet")
                .arg(&self.config.local_aet)
                .arg("-aec")
                .arg(&node.ae_title)
                .arg("--max-pdu")
                .arg(self.config.max_pdu.to_string())
                .args(self.timeout_args())
                .arg(&node.host)
                .arg(node.port.to_string())
                .arg(path);
            debug!("Running: storescu {:?}", cmd.as_std().get_args().collect::<Vec<_>>());

            let output = cmd.output().await.map_err(|e| {
                DimseError::operation_failed(format!("Failed to spawn storescu: {}", e))
            })?;
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let status = status_from_exit(output.status.code(), &stdout, &stderr);
            match status {
                StoreStatus::Ok => info!("C-STORE completed successfully"),
                _ => error!(
                    "C-STORE {}: status={:?}, stdout={}, stderr={}",
                    status,
                    output.status.code(),
                    stdout,
                    stderr
                ),
            }
            Ok(status)
        }

        #[cfg(not(feature = "dcmtk_cli"))]
        {
            Err(DimseError::NotSupported(
                "C-STORE requires feature 'dcmtk_cli'".into(),
            ))
        }
    }

    #[cfg_attr(not(feature = "dcmtk_cli"), allow(dead_code))]
    fn timeout_args(&self) -> Vec<String> {
        vec![
            "-to".into(),
            whole_seconds(self.config.connect_timeout()).to_string(),
            "-ta".into(),
            whole_seconds(self.config.association_timeout()).to_string(),
        ]
    }
}

/// DCMTK timeouts are given in whole seconds
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_millis().div_ceil(1000).max(1) as u64
}

/// Map a storescu exit to a store status
pub fn status_from_exit(code: Option<i32>, stdout: &str, stderr: &str) -> StoreStatus {
    match code {
        Some(0) => {
            if stdout.contains("Store Failed") || stderr.contains("Store Failed") {
                StoreStatus::Fail
            } else {
                StoreStatus::Ok
            }
        }
        Some(c) if ASSOCIATION_EXIT_CODES.contains(&c) => StoreStatus::Retry,
        // killed by a signal
        None => StoreStatus::Retry,
        Some(_) => StoreStatus::Fail,
    }
}

/// Read the file meta group of a Part 10 file, stopping before pixel data
pub async fn read_store_metadata(path: PathBuf) -> Result<StoreMetadata> {
    tokio::task::spawn_blocking(move || {
        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(&path)
            .map_err(|e| {
                DimseError::DicomObject(format!("{} is not a DICOM file: {}", path.display(), e))
            })?;
        let meta = obj.meta();
        Ok(StoreMetadata {
            sop_class_uid: meta.media_storage_sop_class_uid().to_string(),
            sop_instance_uid: meta.media_storage_sop_instance_uid().to_string(),
            transfer_syntax: meta.transfer_syntax().to_string(),
            path,
        })
    })
    .await
    .map_err(|e| DimseError::operation_failed(format!("metadata task failed: {}", e)))?
}

/// Builder for creating SCU instances with custom configurations
pub struct ScuBuilder {
    config: DimseConfig,
}

impl ScuBuilder {
    /// Start building a new SCU
    pub fn new() -> Self {
        Self {
            config: DimseConfig::default(),
        }
    }

    /// Set the local AE title
    pub fn local_aet(mut self, aet: impl Into<String>) -> Self {
        self.config.local_aet = aet.into();
        self
    }

    /// Set the connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the association timeout
    pub fn association_timeout(mut self, timeout: Duration) -> Self {
        self.config.association_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Build the SCU
    pub fn build(self) -> Result<DimseScu> {
        self.config.validate()?;
        Ok(DimseScu::new(self.config))
    }
}

impl Default for ScuBuilder {
    fn default() -> Self {
        Self::new()
    }
}
