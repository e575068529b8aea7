// src/capture/pipeline.rs
//! Streaming body capture pipeline
//!
//! Reads the inbound entity body chunk by chunk, accumulates the first bytes
//! in a scratch buffer until the classifier can decide between a
//! memory-resident buffer and a file-backed storage entry, then streams the
//! remainder directly into the chosen sink.
//!
//! A read or write failure that is not an end-of-stream condition aborts the
//! capture; partial in-memory data is freed and a partially written storage
//! entry is deleted best-effort before the error propagates, so an aborted
//! spill never leaves an orphan in the preservation directory.

use crate::capture::classifier::{BodyClassifier, BodyPlacement};
use crate::capture::storage::{remove_entry, PreserveEntry, PreserveStore};
use crate::capture::CapturedBody;
use crate::transport::{ChunkRead, HostTransport};
use crate::utils::errors::{FilterError, Result};
use bytes::BytesMut;
use metrics::counter;
use tracing::{debug, warn};

/// Per-read chunk size in bytes.
pub const CHUNK_SIZE: usize = 1024;

/// Capacity of the scratch classification buffer.
pub const SCRATCH_CAPACITY: usize = CHUNK_SIZE * 2;

enum Sink {
    Memory(BytesMut),
    File(PreserveEntry),
}

impl Sink {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Sink::Memory(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            Sink::File(entry) => entry.append(data),
        }
    }
}

/// Capture the inbound entity body.
///
/// Returns [`CapturedBody::Absent`] when the source reports zero remaining
/// bytes up front. When a storage entry was used, the inbound content-length
/// marker is cleared so downstream logic does not double-count the body. When
/// the capture aborts mid-spill, the partial storage entry is deleted before
/// the error is returned.
pub fn capture_body<T: HostTransport + ?Sized>(
    transport: &mut T,
    store: Option<&PreserveStore>,
    classifier: &dyn BodyClassifier,
) -> Result<CapturedBody> {
    if transport.remaining_entity_bytes() == 0 {
        return Ok(CapturedBody::Absent);
    }

    let mut sink: Option<Sink> = None;
    if let Err(e) = stream_into_sink(transport, store, classifier, &mut sink) {
        if let Some(Sink::File(entry)) = sink.take() {
            let (path, _) = entry.finish();
            remove_entry(&path);
        }
        return Err(e);
    }

    match sink {
        None => Ok(CapturedBody::Absent),
        Some(Sink::Memory(buf)) => {
            debug!("captured {} bytes in memory", buf.len());
            counter!("preserve_capture_memory_total").increment(1);
            counter!("preserve_capture_bytes_total").increment(buf.len() as u64);
            Ok(CapturedBody::InMemory { data: buf.freeze() })
        }
        Some(Sink::File(entry)) => {
            let (path, length) = entry.finish();
            debug!("captured {} bytes into {}", length, path.display());

            // The preserved body replaces the live entity stream; clear the
            // content-length marker so downstream logic does not double-count.
            if let Err(e) = transport.delete_request_header("Content-Length") {
                warn!("failed to clear content-length after capture: {}", e);
            }

            counter!("preserve_capture_file_total").increment(1);
            counter!("preserve_capture_bytes_total").increment(length);
            Ok(CapturedBody::FileBacked { path, length })
        }
    }
}

/// Stream the entity body into `sink`, opening it once the classifier has
/// seen enough bytes. On error the sink is left in place so the caller can
/// tear down a partially written storage entry.
fn stream_into_sink<T: HostTransport + ?Sized>(
    transport: &mut T,
    store: Option<&PreserveStore>,
    classifier: &dyn BodyClassifier,
    sink: &mut Option<Sink>,
) -> Result<()> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut scratch: Vec<u8> = Vec::with_capacity(SCRATCH_CAPACITY);

    while transport.remaining_entity_bytes() != 0 {
        let read = match transport.read_entity_chunk(&mut chunk)? {
            ChunkRead::Data(n) => n,
            ChunkRead::End => break,
        };

        match sink.as_mut() {
            None => {
                if scratch.len() + read <= SCRATCH_CAPACITY {
                    scratch.extend_from_slice(&chunk[..read]);
                    if scratch.len() < classifier.sniff_len() {
                        // Too little was read in; keep sniffing.
                        continue;
                    }
                    *sink = Some(open_sink(classifier, store, &mut scratch)?);
                } else {
                    // Scratch filled before the sniff window did; decide with
                    // what accumulated and stream the current chunk through.
                    let mut opened = open_sink(classifier, store, &mut scratch)?;
                    let flushed = opened.append(&chunk[..read]);
                    *sink = Some(opened);
                    flushed?;
                }
            }
            Some(sink) => sink.append(&chunk[..read])?,
        }
    }

    // End of stream while still sniffing: classify with what accumulated.
    if sink.is_none() && !scratch.is_empty() {
        *sink = Some(open_sink(classifier, store, &mut scratch)?);
    }

    Ok(())
}

/// Classify the scratch prefix, open the matching sink and flush the scratch
/// bytes into it. A failed flush into a fresh storage entry deletes the entry
/// before the error propagates.
fn open_sink(
    classifier: &dyn BodyClassifier,
    store: Option<&PreserveStore>,
    scratch: &mut Vec<u8>,
) -> Result<Sink> {
    let placement = classifier.classify(scratch);
    debug!(
        "classified body as {} after {} sniffed bytes",
        match placement {
            BodyPlacement::Memory => "memory-resident",
            BodyPlacement::File => "file-backed",
        },
        scratch.len()
    );

    let mut sink = match placement {
        BodyPlacement::Memory => Sink::Memory(BytesMut::with_capacity(SCRATCH_CAPACITY)),
        BodyPlacement::File => {
            let store = store.ok_or_else(|| {
                FilterError::ConfigError(
                    "body preservation requires a configured preservation directory".to_string(),
                )
            })?;
            Sink::File(store.create_entry()?)
        }
    };

    if let Err(e) = sink.append(scratch) {
        if let Sink::File(entry) = sink {
            let (path, _) = entry.finish();
            remove_entry(&path);
        }
        return Err(e);
    }
    scratch.clear();
    Ok(sink)
}
