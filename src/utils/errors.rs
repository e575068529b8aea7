// src/utils/errors.rs
//! Error taxonomy for the preservation engine
//!
//! Every failure surfaced by this crate maps onto one of a small set of
//! categories. Capture, reconstruction and storage errors abort only the
//! request that raised them; they never escalate beyond the filter instance.

use thiserror::Error;

/// Errors produced by the preservation engine
#[derive(Debug, Error)]
pub enum FilterError {
    /// Malformed input to a public operation. Recoverable: the operation is a
    /// no-op and the request continues.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The host reported an allocation failure. Never constructed by this
    /// crate itself (allocation here is infallible); reserved for
    /// `HostTransport` implementations whose host surfaces allocation failure
    /// as a distinct condition. Aborts the current request with an
    /// internal-error outcome.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Filesystem create/write/map failure on the preservation store. Aborts
    /// with an internal-error outcome; a partially written storage entry is
    /// deleted best-effort at the point of failure.
    #[error("storage operation failed: {0}")]
    StorageFailed(String),

    /// The canonical request URL could not be reconstructed. Aborts with a
    /// bad-request outcome.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or inconsistent (for example a file-backed
    /// capture without a configured preservation directory).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An underlying host-transport call failed. Carries the host's native
    /// error code for the operational log.
    #[error("host operation {operation} failed (code {code})")]
    HostOperation { operation: String, code: i32 },
}

impl FilterError {
    /// Shorthand for a host-transport failure.
    pub fn host(operation: impl Into<String>, code: i32) -> Self {
        FilterError::HostOperation {
            operation: operation.into(),
            code,
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, FilterError>;
