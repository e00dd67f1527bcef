//! Error kinds raised while preparing or running a transmission

use thiserror::Error;

/// Result type alias for transmission operations
pub type Result<T> = std::result::Result<T, TransmitError>;

/// Errors raised while preparing or running a transmission.
///
/// Only `MalformedDestination` (before a job starts) and `Cancelled` end a run.
/// Every other kind is local to the file it was raised for.
#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("{0}")]
    MalformedDestination(String),

    #[error("Unable to establish a connection to {url}: {reason}")]
    ConnectionFailure { url: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error unpacking the zip file {archive}: {reason}")]
    Archive { archive: String, reason: String },

    #[error("The response could not be confirmed as a success")]
    AmbiguousResponse,

    #[error("The receiver reported a failure")]
    Rejected,

    #[error("DicomSend result = {0}")]
    RemoteReject(dimse::StoreStatus),

    #[error("Interrupted")]
    Cancelled,
}

impl TransmitError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDestination(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error stops the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransmitError::MalformedDestination(_) | TransmitError::Cancelled
        )
    }
}
