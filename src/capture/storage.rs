// src/capture/storage.rs
//! Temporary storage backend for preserved bodies
//!
//! Durable, file-addressable byte storage under a configured directory.
//! Entries are named by a randomly generated 36-character UUID (no
//! extension) to avoid collision; the writer (capture) and reader (replay)
//! never run concurrently for the same name because replay only begins on a
//! logically later request carrying that name, so no locking is needed.

use crate::utils::errors::{FilterError, Result};
use memmap2::Mmap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage backend rooted at the configured preservation directory.
#[derive(Debug, Clone)]
pub struct PreserveStore {
    dir: PathBuf,
}

impl PreserveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new uniquely named entry, open for exclusive write.
    pub fn create_entry(&self) -> Result<PreserveEntry> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            FilterError::StorageFailed(format!(
                "failed to create preservation directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(&id);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                FilterError::StorageFailed(format!(
                    "unable to create preservation file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        debug!("created preservation entry {}", id);

        Ok(PreserveEntry {
            id,
            path,
            file,
            written: 0,
        })
    }
}

/// Write handle for a storage entry.
#[derive(Debug)]
pub struct PreserveEntry {
    id: String,
    path: PathBuf,
    file: File,
    written: u64,
}

impl PreserveEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk to the entry.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).map_err(|e| {
            FilterError::StorageFailed(format!(
                "unable to write to preservation file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Close the entry, returning its path and total length.
    pub fn finish(self) -> (PathBuf, u64) {
        (self.path, self.written)
    }
}

/// Read-side view of a storage entry, memory-mapped for zero-copy replay.
///
/// The mapping stays valid for as long as the value lives; the filter holds
/// it until the request completes so the host can reference the bytes during
/// sub-request execution.
#[derive(Debug)]
pub struct MappedBody {
    _file: File,
    mmap: Option<Mmap>,
}

impl MappedBody {
    /// Open and map an entry for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            FilterError::StorageFailed(format!(
                "unable to open preservation file {}: {}",
                path.display(),
                e
            ))
        })?;

        let len = file
            .metadata()
            .map_err(|e| {
                FilterError::StorageFailed(format!(
                    "unable to stat preservation file {}: {}",
                    path.display(),
                    e
                ))
            })?
            .len();

        // A zero-length file cannot be mapped; expose it as an empty body.
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe {
                Mmap::map(&file).map_err(|e| {
                    FilterError::StorageFailed(format!(
                        "unable to map preservation file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            })
        };

        Ok(Self { _file: file, mmap })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Delete a storage entry, best-effort. Failures are logged, never escalated.
pub fn remove_entry(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove preservation file {}: {}", path.display(), e);
    } else {
        debug!("removed preservation file {}", path.display());
    }
}

/// Scope guard deleting a storage entry when dropped.
///
/// The filter arms one guard per preserved file; `disarm` hands ownership of
/// the entry back (used when the policy engine wants the file to survive the
/// current request for a later replay).
#[derive(Debug)]
pub struct EntryGuard {
    path: Option<PathBuf>,
}

impl EntryGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Keep the entry on disk past this guard's lifetime.
    pub fn disarm(&mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove_entry(&path);
        }
    }
}
