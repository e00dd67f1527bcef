//! Single-file transmitters
//!
//! A [`Transmitter`] sends exactly one file and reports what happened. It never
//! returns an error to the caller: every failure becomes a
//! [`Outcome::Failure`] with a message for the progress log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransmitError;

pub mod dicom;
pub mod http;

pub use dicom::{DicomSender, DicomTransmitter, ScuSender};
pub use http::{classify_response, HttpOptions, HttpTransmitter, ResponseClass};

/// Result of sending one file
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failure(TransmitError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Outcome plus the progress-log message describing it
#[derive(Debug)]
pub struct Transmission {
    pub outcome: Outcome,
    pub message: String,
}

impl Transmission {
    pub fn success(message: String) -> Self {
        Self {
            outcome: Outcome::Success,
            message,
        }
    }

    pub fn failure(error: TransmitError, message: String) -> Self {
        Self {
            outcome: Outcome::Failure(error),
            message,
        }
    }
}

#[async_trait]
pub trait Transmitter: Send + Sync {
    /// Send one file. `sequence` is the 1-based position of this attempt in
    /// the run and only appears in the message.
    async fn transmit(&self, file: &Path, sequence: u32) -> Transmission;
}

/// First line of every per-file message
pub(crate) fn send_header(sequence: u32, file: &Path, destination: &str) -> String {
    format!(
        "<b>{}</b>: Send {} to {}<br>",
        sequence,
        absolute(file).display(),
        destination
    )
}

/// Failure text in the error style
pub(crate) fn red(text: impl std::fmt::Display) -> String {
    format!("<font color=\"red\">{}</font><br>", text)
}

fn absolute(file: &Path) -> PathBuf {
    file.canonicalize().unwrap_or_else(|_| file.to_path_buf())
}
