// src/transport/mod.rs
//! Abstract host transport layer
//!
//! The engine never talks to a concrete web server. Each host environment
//! implements [`HostTransport`] once and injects it per request; the trait
//! mirrors the capability set the engine consumes:
//!
//! - entity-body streaming (`remaining_entity_bytes`, `read_entity_chunk`)
//! - URL fragments and server variables
//! - request/response header manipulation
//! - child-exchange clone/execute/release for sub-request replay
//! - direct response writing

use crate::utils::errors::{FilterError, Result};
use http::{Method, StatusCode};
use std::net::IpAddr;
use tracing::warn;

#[cfg(test)]
pub mod mock;

/// Opaque handle to a cloned child exchange, issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeHandle(pub u64);

/// What a cloned exchange carries over from its parent.
#[derive(Debug, Clone, Copy)]
pub struct CloneFlags {
    /// Request line and connection basics
    pub basics: bool,

    /// Request headers
    pub headers: bool,

    /// Entity body
    pub entity: bool,
}

impl CloneFlags {
    /// Basics, headers and entity body.
    pub const ALL: CloneFlags = CloneFlags {
        basics: true,
        headers: true,
        entity: true,
    };
}

/// Result of a single entity-body read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRead {
    /// `n` bytes were copied into the buffer.
    Data(usize),

    /// The host reported end-of-stream.
    End,
}

/// How the host completed a child-exchange execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Execution finished synchronously; the exchange can be released now.
    Completed,

    /// Completion is deferred; the caller keeps the handle and releases it
    /// from its asynchronous-completion notification.
    Deferred,
}

/// Per-request view of the host web server.
///
/// Methods returning `Result` surface [`FilterError::HostOperation`] with the
/// host's native error code when the underlying call fails.
pub trait HostTransport {
    /// HTTP method of the current request.
    fn request_method(&self) -> Method;

    /// Bytes of entity body the host still holds for this request.
    fn remaining_entity_bytes(&mut self) -> u64;

    /// Read the next chunk of the entity body into `buf`.
    ///
    /// An end-of-stream condition is reported as [`ChunkRead::End`], never as
    /// an error. Reads may block for the duration of the host's own streaming
    /// primitive; the engine imposes no timeout of its own.
    fn read_entity_chunk(&mut self, buf: &mut [u8]) -> Result<ChunkRead>;

    /// The transport-layer view of the full request URL
    /// (`scheme://host:port/path?query`), if the host exposes one.
    fn cooked_url(&self) -> Option<String>;

    /// The host-local path as received on the wire (`/path...`), if exposed.
    fn raw_path(&self) -> Option<String>;

    /// Look up a named server variable.
    fn server_variable(&self, name: &str) -> Option<String>;

    /// Set a request header, replacing any existing value.
    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Delete all instances of a request header.
    fn delete_request_header(&mut self, name: &str) -> Result<()>;

    /// Add a response header (without replacing existing values).
    fn set_response_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Rewrite the URL of the current exchange.
    fn set_request_url(&mut self, url: &str) -> Result<()>;

    /// Rewrite the method of the current exchange.
    fn set_request_method(&mut self, method: &Method) -> Result<()>;

    /// Replace the entity body of the current exchange. The buffer must stay
    /// valid until the request completes; the engine keeps file-backed bodies
    /// mapped for exactly that long.
    fn insert_entity_body(&mut self, body: &[u8]) -> Result<()>;

    /// Remote peer address, used when no client-IP header is configured.
    fn remote_addr(&self) -> Option<IpAddr>;

    /// Clone the current exchange into a child exchange.
    fn clone_exchange(&mut self, flags: CloneFlags) -> Result<ExchangeHandle>;

    /// Reissue a child exchange against `target_url` with `method`,
    /// buffering its response.
    fn execute_exchange(
        &mut self,
        exchange: ExchangeHandle,
        target_url: &str,
        method: &Method,
    ) -> Result<ExecuteOutcome>;

    /// Release a child exchange. Must be called exactly once per clone.
    fn release_exchange(&mut self, exchange: ExchangeHandle) -> Result<()>;

    /// Write a complete response: status, content type, content length and
    /// body, flushed to the client.
    fn write_response(&mut self, status: StatusCode, content_type: &str, body: &[u8]) -> Result<()>;
}

/// Replace a request header: delete all existing instances, then set the new
/// value. A failed delete is best-effort and only logged; a failed set is a
/// hard error.
pub fn replace_request_header<T: HostTransport + ?Sized>(
    transport: &mut T,
    name: &str,
    value: &str,
) -> Result<()> {
    if name.is_empty() {
        return Err(FilterError::InvalidArgument("empty header name".to_string()));
    }
    if let Err(e) = transport.delete_request_header(name) {
        warn!("failed to delete request header {}: {}", name, e);
    }
    transport.set_request_header(name, value)
}
