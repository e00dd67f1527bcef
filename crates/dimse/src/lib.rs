//! DIMSE (DICOM Message Service Element) client
//!
//! This crate provides the Service Class User side of the DICOM storage
//! service: one C-STORE per file over a fresh association.
//!
//! # Features
//! - Outbound C-STORE (SCU)
//! - DCMTK command line tools as the association layer (feature = "dcmtk_cli")

pub mod config;
pub mod error;
pub mod scu;
pub mod types;

// Re-export commonly used types
pub use config::{DimseConfig, RemoteNode};
pub use error::{DimseError, Result};
pub use scu::{DimseScu, ScuBuilder};
pub use types::{StoreMetadata, StoreStatus};

/// Maximum length of an Application Entity title
pub const MAX_AE_TITLE_LEN: usize = 16;
