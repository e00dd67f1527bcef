//! Common types for DIMSE operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result of a single C-STORE attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreStatus {
    /// The remote node accepted the object
    Ok,
    /// The remote node (or the object itself) refused the store; sending
    /// the same file again will not help
    Fail,
    /// The association could not be completed; the send may succeed later
    Retry,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreStatus::Ok => write!(f, "OK"),
            StoreStatus::Fail => write!(f, "FAIL"),
            StoreStatus::Retry => write!(f, "RETRY"),
        }
    }
}

/// Identifying attributes read from the file meta group before a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Path of the Part 10 file
    pub path: PathBuf,

    /// Media Storage SOP Class UID
    pub sop_class_uid: String,

    /// Media Storage SOP Instance UID
    pub sop_instance_uid: String,

    /// Transfer syntax UID
    pub transfer_syntax: String,
}
