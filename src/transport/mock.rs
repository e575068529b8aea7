// src/transport/mock.rs
//! Scripted in-memory transport for tests
//!
//! Records every call the engine makes so tests can assert on header
//! rewrites, response writes and exchange lifecycles. Read chunking and
//! selected failures are configurable.

use crate::transport::{
    ChunkRead, CloneFlags, ExchangeHandle, ExecuteOutcome, HostTransport,
};
use crate::utils::errors::{FilterError, Result};
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::net::IpAddr;

/// A recorded response write.
#[derive(Debug, Clone)]
pub struct WrittenResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// A recorded child-exchange execution.
#[derive(Debug, Clone)]
pub struct ExecutedExchange {
    pub exchange: ExchangeHandle,
    pub target_url: String,
    pub method: Method,
}

/// Scripted transport backed by vectors and maps.
#[derive(Debug)]
pub struct MockTransport {
    pub method: Method,
    pub body: Vec<u8>,
    pub cooked_url: Option<String>,
    pub raw_path: Option<String>,
    pub variables: HashMap<String, String>,
    pub remote: Option<IpAddr>,

    /// Largest chunk a single read returns, regardless of buffer size.
    pub max_read: usize,

    /// Fail the nth read (0-based) with a host error.
    pub fail_read_at: Option<usize>,

    /// Make `delete_request_header` fail.
    pub fail_header_delete: bool,

    /// Make `clone_exchange` fail.
    pub fail_clone: bool,

    /// Make `execute_exchange` fail.
    pub fail_execute: bool,

    /// Outcome reported by `execute_exchange`.
    pub execute_outcome: ExecuteOutcome,

    // Recorded engine activity
    pub request_headers: Vec<(String, String)>,
    pub deleted_request_headers: Vec<String>,
    pub response_headers: Vec<(String, String)>,
    pub rewritten_url: Option<String>,
    pub rewritten_method: Option<Method>,
    pub inserted_body: Option<Vec<u8>>,
    pub cloned: Vec<ExchangeHandle>,
    pub released: Vec<ExchangeHandle>,
    pub executed: Vec<ExecutedExchange>,
    pub responses: Vec<WrittenResponse>,

    read_pos: usize,
    reads_done: usize,
    next_handle: u64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            method: Method::POST,
            body: Vec::new(),
            cooked_url: None,
            raw_path: None,
            variables: HashMap::new(),
            remote: None,
            max_read: usize::MAX,
            fail_read_at: None,
            fail_header_delete: false,
            fail_clone: false,
            fail_execute: false,
            execute_outcome: ExecuteOutcome::Completed,
            request_headers: Vec::new(),
            deleted_request_headers: Vec::new(),
            response_headers: Vec::new(),
            rewritten_url: None,
            rewritten_method: None,
            inserted_body: None,
            cloned: Vec::new(),
            released: Vec::new(),
            executed: Vec::new(),
            responses: Vec::new(),
            read_pos: 0,
            reads_done: 0,
            next_handle: 1,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_cooked_url(mut self, url: impl Into<String>) -> Self {
        self.cooked_url = Some(url.into());
        self
    }

    pub fn with_raw_path(mut self, path: impl Into<String>) -> Self {
        self.raw_path = Some(path.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }

    /// Current value of a request header, case-insensitive.
    pub fn request_header(&self, name: &str) -> Option<String> {
        self.request_headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Last response written, if any.
    pub fn last_response(&self) -> Option<&WrittenResponse> {
        self.responses.last()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTransport for MockTransport {
    fn request_method(&self) -> Method {
        self.method.clone()
    }

    fn remaining_entity_bytes(&mut self) -> u64 {
        (self.body.len() - self.read_pos) as u64
    }

    fn read_entity_chunk(&mut self, buf: &mut [u8]) -> Result<ChunkRead> {
        if self.fail_read_at == Some(self.reads_done) {
            self.reads_done += 1;
            return Err(FilterError::host("ReadEntityBody", 1117));
        }
        self.reads_done += 1;

        let remaining = self.body.len() - self.read_pos;
        if remaining == 0 {
            return Ok(ChunkRead::End);
        }

        let n = remaining.min(buf.len()).min(self.max_read);
        buf[..n].copy_from_slice(&self.body[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(ChunkRead::Data(n))
    }

    fn cooked_url(&self) -> Option<String> {
        self.cooked_url.clone()
    }

    fn raw_path(&self) -> Option<String> {
        self.raw_path.clone()
    }

    fn server_variable(&self, name: &str) -> Option<String> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        // HTTP_* variables reflect the live request headers, as they do on a
        // real host.
        if let Some(rest) = name.strip_prefix("HTTP_") {
            let header = rest.replace('_', "-");
            return self.request_header(&header);
        }
        None
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.request_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.request_headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn delete_request_header(&mut self, name: &str) -> Result<()> {
        if self.fail_header_delete {
            return Err(FilterError::host("DeleteHeader", 87));
        }
        self.deleted_request_headers.push(name.to_string());
        self.request_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        Ok(())
    }

    fn set_response_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.response_headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_request_url(&mut self, url: &str) -> Result<()> {
        self.rewritten_url = Some(url.to_string());
        Ok(())
    }

    fn set_request_method(&mut self, method: &Method) -> Result<()> {
        self.rewritten_method = Some(method.clone());
        Ok(())
    }

    fn insert_entity_body(&mut self, body: &[u8]) -> Result<()> {
        self.inserted_body = Some(body.to_vec());
        Ok(())
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        self.remote
    }

    fn clone_exchange(&mut self, _flags: CloneFlags) -> Result<ExchangeHandle> {
        if self.fail_clone {
            return Err(FilterError::host("CloneContext", 8));
        }
        let handle = ExchangeHandle(self.next_handle);
        self.next_handle += 1;
        self.cloned.push(handle);
        Ok(handle)
    }

    fn execute_exchange(
        &mut self,
        exchange: ExchangeHandle,
        target_url: &str,
        method: &Method,
    ) -> Result<ExecuteOutcome> {
        if self.fail_execute {
            return Err(FilterError::host("ExecuteRequest", 1359));
        }
        self.executed.push(ExecutedExchange {
            exchange,
            target_url: target_url.to_string(),
            method: method.clone(),
        });
        Ok(self.execute_outcome)
    }

    fn release_exchange(&mut self, exchange: ExchangeHandle) -> Result<()> {
        self.released.push(exchange);
        Ok(())
    }

    fn write_response(&mut self, status: StatusCode, content_type: &str, body: &[u8]) -> Result<()> {
        self.responses.push(WrittenResponse {
            status,
            content_type: content_type.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunked_reads() {
        let mut transport = MockTransport::new().with_body(b"abcdef".to_vec()).with_max_read(4);
        let mut buf = [0u8; 16];

        assert_eq!(transport.read_entity_chunk(&mut buf).unwrap(), ChunkRead::Data(4));
        assert_eq!(transport.read_entity_chunk(&mut buf).unwrap(), ChunkRead::Data(2));
        assert_eq!(transport.remaining_entity_bytes(), 0);
        assert_eq!(transport.read_entity_chunk(&mut buf).unwrap(), ChunkRead::End);
    }

    #[test]
    fn test_http_variables_track_headers() {
        let mut transport = MockTransport::new();
        assert!(transport.server_variable("HTTP_COOKIE").is_none());

        transport.set_request_header("Cookie", "session=abc").unwrap();
        assert_eq!(
            transport.server_variable("HTTP_COOKIE"),
            Some("session=abc".to_string())
        );
    }

    #[test]
    fn test_exchange_lifecycle() {
        let mut transport = MockTransport::new();
        let handle = transport.clone_exchange(CloneFlags::ALL).unwrap();
        transport
            .execute_exchange(handle, "https://host/app", &Method::POST)
            .unwrap();
        transport.release_exchange(handle).unwrap();

        assert_eq!(transport.executed.len(), 1);
        assert_eq!(transport.released, vec![handle]);
    }
}
