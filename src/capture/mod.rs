// src/capture/mod.rs
//! Streaming body capture
//!
//! This module captures an arbitrary-size inbound entity body without
//! assuming it fits in memory:
//!
//! - **Classifier**: pluggable first-bytes strategy deciding memory vs file
//! - **Pipeline**: streaming state machine routing chunks to the chosen sink
//! - **Storage**: temporary storage backend for spilled bodies
//!
//! # Flow
//!
//! ```text
//! Host entity stream → sniff first bytes → classify
//!                          │
//!                          ├─ memory-resident → growable buffer
//!                          └─ file-backed     → UUID-named storage entry
//! ```

pub mod classifier;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use classifier::{BodyClassifier, BodyPlacement, MarkerClassifier};
pub use pipeline::{capture_body, CHUNK_SIZE, SCRATCH_CAPACITY};
pub use storage::{EntryGuard, MappedBody, PreserveStore};

use bytes::Bytes;
use std::path::PathBuf;

/// Descriptor for a captured entity body.
///
/// Created by the capture pipeline, consumed exactly once by the replay
/// dispatcher, and destroyed (memory freed / temp file deleted) when the
/// filter instance owning the request completes.
#[derive(Debug, Clone)]
pub enum CapturedBody {
    /// No entity body was present.
    Absent,

    /// Body kept in memory for programmatic access.
    InMemory { data: Bytes },

    /// Body spilled to a temporary storage entry.
    FileBacked { path: PathBuf, length: u64 },
}

impl CapturedBody {
    /// Total captured length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            CapturedBody::Absent => 0,
            CapturedBody::InMemory { data } => data.len() as u64,
            CapturedBody::FileBacked { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CapturedBody::Absent)
    }
}
