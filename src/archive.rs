//! Zip expansion
//!
//! Entries are extracted one at a time into their own temporary directory.
//! An [`ExtractedEntry`] owns that directory; it is removed when the entry is
//! closed or dropped, whatever happened to the transmission in between.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Result, TransmitError};

const TEMP_PREFIX: &str = "FS-";

/// Whether a file should be treated as a zip archive
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".zip"))
}

/// A zip entry copied to a temporary file
#[derive(Debug)]
pub struct ExtractedEntry {
    dir: TempDir,
    path: PathBuf,
    entry_name: String,
}

impl ExtractedEntry {
    /// The temporary copy; named after the entry's base name
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full name of the entry inside the archive
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Remove the temporary copy now, logging rather than failing if that
    /// is not possible
    pub fn close(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("failed to remove temporary directory {}: {}", dir.display(), e);
        }
    }
}

/// Sequential reader over the file entries of one zip archive
pub struct ArchiveReader {
    path: PathBuf,
    archive: Option<ZipArchive<File>>,
    next_index: usize,
    temp_root: Option<PathBuf>,
}

impl ArchiveReader {
    /// Open `path` as a zip archive. Temporary copies go under `temp_root`,
    /// or the system temporary directory when it is `None`.
    pub async fn open(path: &Path, temp_root: Option<PathBuf>) -> Result<Self> {
        let owned = path.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || {
            let file = File::open(&owned)?;
            ZipArchive::new(file).map_err(io::Error::other)
        })
        .await
        .map_err(|e| archive_error(path, e))?
        .map_err(|e| archive_error(path, e))?;

        debug!("opened {} with {} entries", path.display(), archive.len());
        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            next_index: 0,
            temp_root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract the next file entry, skipping directories and entries without
    /// a usable base name. `Ok(None)` once the archive is exhausted.
    pub async fn next_entry(&mut self) -> Result<Option<ExtractedEntry>> {
        let Some(mut archive) = self.archive.take() else {
            return Ok(None);
        };
        let start = self.next_index;
        let temp_root = self.temp_root.clone();

        let (archive, next_index, result) = tokio::task::spawn_blocking(move || {
            let mut index = start;
            let result = loop {
                if index >= archive.len() {
                    break Ok(None);
                }
                let i = index;
                index += 1;
                match extract_entry(&mut archive, i, temp_root.as_deref()) {
                    Ok(Some(entry)) => break Ok(Some(entry)),
                    Ok(None) => continue,
                    Err(e) => break Err(e),
                }
            };
            (archive, index, result)
        })
        .await
        .map_err(|e| archive_error(&self.path, e))?;

        self.next_index = next_index;
        match result {
            Ok(Some(entry)) => {
                self.archive = Some(archive);
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            // the archive is abandoned after the first unreadable entry
            Err(e) => Err(archive_error(&self.path, e)),
        }
    }
}

fn extract_entry(
    archive: &mut ZipArchive<File>,
    index: usize,
    temp_root: Option<&Path>,
) -> io::Result<Option<ExtractedEntry>> {
    let mut entry = archive.by_index(index).map_err(io::Error::other)?;
    if entry.is_dir() {
        return Ok(None);
    }
    let entry_name = entry.name().to_string();
    let base = entry_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        return Ok(None);
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    let dir = match temp_root {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };
    let path = dir.path().join(&base);
    let mut out = File::create(&path)?;
    io::copy(&mut entry, &mut out)?;

    Ok(Some(ExtractedEntry {
        dir,
        path,
        entry_name,
    }))
}

fn archive_error(path: &Path, reason: impl std::fmt::Display) -> TransmitError {
    TransmitError::Archive {
        archive: path.display().to_string(),
        reason: reason.to_string(),
    }
}
