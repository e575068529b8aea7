// src/replay/reinject.rs
//! Preserved-body re-injection
//!
//! Before a sub-request replay, the preserved bytes are placed back into the
//! current exchange as its entity body and the content-length header is
//! restored to the preserved length. File-backed bodies are memory-mapped so
//! the host references the file pages directly; the mapping must stay alive
//! until the request completes.

use crate::capture::{CapturedBody, MappedBody};
use crate::transport::{replace_request_header, HostTransport};
use crate::utils::errors::Result;
use tracing::debug;

/// Open a file-backed descriptor for zero-copy access. In-memory and absent
/// bodies need no mapping.
pub fn open_preserved(body: &CapturedBody) -> Result<Option<MappedBody>> {
    match body {
        CapturedBody::FileBacked { path, .. } => Ok(Some(MappedBody::open(path)?)),
        CapturedBody::InMemory { .. } | CapturedBody::Absent => Ok(None),
    }
}

/// Insert `body` as the current exchange's entity body and restore the
/// content-length header.
pub fn reinject_body<T: HostTransport + ?Sized>(transport: &mut T, body: &[u8]) -> Result<()> {
    transport.insert_entity_body(body)?;
    replace_request_header(transport, "Content-Length", &body.len().to_string())?;
    debug!("reinjected {} byte entity body", body.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PreserveStore;
    use crate::transport::mock::MockTransport;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[test]
    fn test_reinject_sets_body_and_length() {
        let mut transport = MockTransport::new();
        reinject_body(&mut transport, b"a=1&b=2").unwrap();

        assert_eq!(transport.inserted_body.as_deref(), Some(&b"a=1&b=2"[..]));
        assert_eq!(transport.request_header("Content-Length"), Some("7".to_string()));
    }

    #[test]
    fn test_open_preserved_maps_file_backed() {
        let dir = tempdir().unwrap();
        let store = PreserveStore::new(dir.path());
        let mut entry = store.create_entry().unwrap();
        entry.append(b"payload").unwrap();
        let (path, length) = entry.finish();

        let body = CapturedBody::FileBacked { path, length };
        let mapped = open_preserved(&body).unwrap().unwrap();
        assert_eq!(mapped.as_bytes(), b"payload");
    }

    #[test]
    fn test_open_preserved_skips_memory() {
        let body = CapturedBody::InMemory {
            data: Bytes::from_static(b"x"),
        };
        assert!(open_preserved(&body).unwrap().is_none());
        assert!(open_preserved(&CapturedBody::Absent).unwrap().is_none());
    }
}
