//! File tree traversal
//!
//! Visits a root file or directory, expanding archives and handing every
//! other file to the job's transmitter. Cancellation is observed before each
//! file or directory entry; a transfer that has already started is left to
//! finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::archive::{self, ArchiveReader};
use crate::events::{EventSender, TransmissionEvent};
use crate::filter::FileFilter;
use crate::transmit::{red, Outcome, Transmitter};

/// Traversal switches taken from the job options
#[derive(Debug, Clone, Default)]
pub struct TraversalSettings {
    pub recurse_subdirectories: bool,
    pub expand_archives: bool,
    pub temp_dir: Option<PathBuf>,
}

pub struct Traversal {
    filter: Arc<dyn FileFilter>,
    transmitter: Arc<dyn Transmitter>,
    settings: TraversalSettings,
    events: EventSender,
    cancel: CancellationToken,
    sent: u32,
    skipped: u32,
}

impl Traversal {
    pub fn new(
        filter: Arc<dyn FileFilter>,
        transmitter: Arc<dyn Transmitter>,
        settings: TraversalSettings,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            filter,
            transmitter,
            settings,
            events,
            cancel,
            sent: 0,
            skipped: 0,
        }
    }

    /// Files the receiver accepted
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Files that were attempted and failed
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Visit `path`: a file is expanded or transmitted, a directory has its
    /// filtered entries visited in name order.
    pub fn visit<'a>(&'a mut self, path: &'a Path) -> BoxFuture<'a, ()> {
        async move {
            if self.cancel.is_cancelled() {
                return;
            }

            let is_dir = tokio::fs::metadata(path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);

            if !is_dir {
                if self.settings.expand_archives && archive::is_archive(path) {
                    self.expand(path).await;
                } else {
                    self.transmit(path).await;
                }
                return;
            }

            for (entry, entry_is_dir) in self.list(path).await {
                if self.cancel.is_cancelled() {
                    debug!("cancelled while visiting {}", path.display());
                    break;
                }
                if !entry_is_dir || self.settings.recurse_subdirectories {
                    self.visit(&entry).await;
                }
            }
        }
        .boxed()
    }

    async fn transmit(&mut self, path: &Path) {
        let sequence = self.sent + self.skipped + 1;
        let transmission = self.transmitter.transmit(path, sequence).await;
        let event = match transmission.outcome {
            Outcome::Success => {
                self.sent += 1;
                TransmissionEvent::success(transmission.message)
            }
            Outcome::Failure(e) => {
                self.skipped += 1;
                debug!("{} not sent: {}", path.display(), e);
                TransmissionEvent::failure(transmission.message)
            }
        };
        self.events.send(event);
    }

    async fn expand(&mut self, path: &Path) {
        let mut reader = match ArchiveReader::open(path, self.settings.temp_dir.clone()).await {
            Ok(reader) => reader,
            Err(e) => return self.report(e),
        };

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    debug!("sending {} from {}", entry.entry_name(), path.display());
                    self.visit(entry.path()).await;
                    entry.close();
                }
                Ok(None) => break,
                Err(e) => {
                    self.report(e);
                    break;
                }
            }
        }
    }

    /// Entries of `dir` accepted by the filter, sorted by file name
    async fn list(&self, dir: &Path) -> Vec<(PathBuf, bool)> {
        let owned = dir.to_path_buf();
        let filter = self.filter.clone();
        let listed = tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            let mut errors = Vec::new();
            for item in WalkDir::new(&owned)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
                .sort_by_file_name()
            {
                match item {
                    Ok(entry) => {
                        let is_dir = entry.file_type().is_dir();
                        if filter.accept(entry.path(), is_dir) {
                            entries.push((entry.into_path(), is_dir));
                        }
                    }
                    Err(e) => errors.push(e.to_string()),
                }
            }
            (entries, errors)
        })
        .await;

        match listed {
            Ok((entries, errors)) => {
                for e in errors {
                    warn!("listing {}: {}", dir.display(), e);
                    self.events.send(TransmissionEvent::failure(format!(
                        "{}{}<br>",
                        red(format!("Unable to list {}:", dir.display())),
                        e
                    )));
                }
                entries
            }
            Err(e) => {
                warn!("listing {} failed: {}", dir.display(), e);
                Vec::new()
            }
        }
    }

    /// A failure that is not tied to one transmission attempt
    fn report(&self, error: crate::error::TransmitError) {
        warn!("{}", error);
        self.events
            .send(TransmissionEvent::failure(format!("{}<br>", red(&error))));
    }
}
