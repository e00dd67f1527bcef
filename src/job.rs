//! Transmission jobs
//!
//! A [`TransmissionJob`] is one run over one root path. Starting it spawns a
//! tokio task that walks the tree and pushes events; the returned
//! [`JobHandle`] gives the caller the event receiver and the cancellation
//! switch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::content_type::{ContentTypeResolver, ContentTypeTable};
use crate::destination::Destination;
use crate::error::Result;
use crate::events::{event_channel, EventReceiver, EventSender, EventStatus, TransmissionEvent};
use crate::filter::FileFilter;
use crate::transmit::{DicomTransmitter, HttpOptions, HttpTransmitter, ScuSender, Transmitter};
use crate::traversal::{Traversal, TraversalSettings};

/// Per-run switches, already resolved by the caller
#[derive(Debug, Clone)]
pub struct TransmissionOptions {
    pub recurse_subdirectories: bool,
    pub expand_archives: bool,
    /// Send every HTTP file as `application/x-mirc-dicom`
    pub force_content_type: bool,
    pub http_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub dicom_association_timeout: Duration,
    /// Extension table for HTTP content types; `None` sends the default type
    pub content_types: Option<Arc<ContentTypeTable>>,
    /// Where archive entries are extracted; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransmissionOptions {
    fn default() -> Self {
        Self {
            recurse_subdirectories: true,
            expand_archives: true,
            force_content_type: true,
            http_timeout: Duration::from_millis(5000),
            accept_invalid_certs: true,
            dicom_association_timeout: Duration::from_millis(10_000),
            content_types: Some(ContentTypeTable::builtin()),
            temp_dir: None,
        }
    }
}

/// Counts reported when a run ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub sent: u32,
    pub skipped: u32,
    pub cancelled: bool,
}

impl JobSummary {
    fn terminal_event(&self) -> TransmissionEvent {
        if self.cancelled {
            TransmissionEvent::done(
                "<br><b><font color=\"red\">Interrupted</font></b>",
                EventStatus::Failure,
            )
        } else {
            let status = if self.skipped == 0 {
                EventStatus::Success
            } else {
                EventStatus::Failure
            };
            TransmissionEvent::done(
                format!(
                    "<br><b>Done.</b><br>{} file{} sent, {} skipped",
                    self.sent,
                    if self.sent == 1 { "" } else { "s" },
                    self.skipped
                ),
                status,
            )
        }
    }
}

/// Build the transmitter for a destination. `label` is how the destination
/// is named in progress messages.
pub fn transmitter_for(
    destination: &Destination,
    label: &str,
    options: &TransmissionOptions,
) -> Result<Arc<dyn Transmitter>> {
    match destination {
        Destination::Http { url } | Destination::Https { url } => {
            let resolver =
                ContentTypeResolver::new(options.force_content_type, options.content_types.clone());
            let http = HttpOptions {
                timeout: options.http_timeout,
                accept_invalid_certs: options.accept_invalid_certs,
            };
            Ok(Arc::new(HttpTransmitter::new(url.clone(), resolver, &http)?))
        }
        Destination::Dicom { .. } => {
            let sender = ScuSender::new(destination, options.dicom_association_timeout)?;
            Ok(Arc::new(DicomTransmitter::new(label, Arc::new(sender))))
        }
    }
}

pub struct TransmissionJob {
    root: PathBuf,
    filter: Arc<dyn FileFilter>,
    destination: Destination,
    options: TransmissionOptions,
    transmitter: Arc<dyn Transmitter>,
}

impl TransmissionJob {
    /// Set up a job. Fails before anything runs if the destination cannot be
    /// used.
    pub fn new(
        root: impl Into<PathBuf>,
        filter: Arc<dyn FileFilter>,
        destination: Destination,
        options: TransmissionOptions,
    ) -> Result<Self> {
        let label = destination.to_string();
        let transmitter = transmitter_for(&destination, &label, &options)?;
        Ok(Self::with_transmitter(root, filter, destination, options, transmitter))
    }

    /// Parse `destination` and set up a job. Progress messages name the
    /// destination as it was written.
    pub fn prepare(
        root: impl Into<PathBuf>,
        filter: Arc<dyn FileFilter>,
        destination: &str,
        options: TransmissionOptions,
    ) -> Result<Self> {
        let parsed = Destination::parse(destination)?;
        let transmitter = transmitter_for(&parsed, destination.trim(), &options)?;
        Ok(Self::with_transmitter(root, filter, parsed, options, transmitter))
    }

    /// Set up a job with an explicit transmitter
    pub fn with_transmitter(
        root: impl Into<PathBuf>,
        filter: Arc<dyn FileFilter>,
        destination: Destination,
        options: TransmissionOptions,
        transmitter: Arc<dyn Transmitter>,
    ) -> Self {
        Self {
            root: root.into(),
            filter,
            destination,
            options,
            transmitter,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn options(&self) -> &TransmissionOptions {
        &self.options
    }

    /// Run to completion on the current task, ending with exactly one
    /// terminal event.
    pub async fn run(self, events: EventSender, cancel: CancellationToken) -> JobSummary {
        info!(
            "Sending {} to {} (subdirectories: {}, unpack zip: {}, force content type: {})",
            self.root.display(),
            self.destination,
            self.options.recurse_subdirectories,
            self.options.expand_archives,
            self.options.force_content_type
        );

        let settings = TraversalSettings {
            recurse_subdirectories: self.options.recurse_subdirectories,
            expand_archives: self.options.expand_archives,
            temp_dir: self.options.temp_dir.clone(),
        };
        let mut traversal = Traversal::new(
            self.filter,
            self.transmitter,
            settings,
            events.clone(),
            cancel,
        );
        traversal.visit(&self.root).await;

        let summary = JobSummary {
            sent: traversal.sent(),
            skipped: traversal.skipped(),
            cancelled: traversal.is_cancelled(),
        };
        if summary.cancelled {
            info!("Interrupted after {} sent, {} skipped", summary.sent, summary.skipped);
        } else {
            info!("Done: {} sent, {} skipped", summary.sent, summary.skipped);
        }
        events.send(summary.terminal_event());
        summary
    }

    /// Spawn the run on a background task
    pub fn start(self) -> JobHandle {
        let (tx, rx) = event_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(tx, cancel.clone()));
        JobHandle {
            events: rx,
            cancel,
            task,
        }
    }
}

/// Caller's side of a running job
pub struct JobHandle {
    events: EventReceiver,
    cancel: CancellationToken,
    task: JoinHandle<JobSummary>,
}

impl JobHandle {
    /// Ask the job to stop at the next file or directory boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn events(&mut self) -> &mut EventReceiver {
        &mut self.events
    }

    /// Wait for the job task to finish
    pub async fn join(self) -> std::result::Result<JobSummary, JoinError> {
        self.task.await
    }
}
