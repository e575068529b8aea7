// src/lib.rs
//! Request-body preservation and replay engine
//!
//! This library implements the request-lifecycle core of an HTTP-intercepting
//! access-control filter: when a request must be redirected away (for example
//! to an authentication endpoint) before it can complete, the entity body the
//! client already submitted is captured, preserved across the redirect round
//! trip, and replayed once the client returns.
//!
//! The engine is structured into several key modules:
//!
//! - **transport**: abstract host web-server capability set, one trait
//!   implementation per host environment, injected once per request
//! - **request**: request lifecycle record, canonical-URL reconstruction,
//!   inbound cookie merging
//! - **capture**: streaming body capture with memory/file routing and the
//!   temporary storage backend for spilled bodies
//! - **replay**: deferred re-delivery of a preserved body (auto-submit form,
//!   sub-request execution, or JSON envelope for API callers)
//! - **filter**: per-request driver exposing the policy-engine hooks
//! - **observability**: tracing initialization
//! - **utils**: errors and configuration

// Public module exports
pub mod capture;
pub mod filter;
pub mod observability;
pub mod replay;
pub mod request;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use capture::{BodyClassifier, CapturedBody, MarkerClassifier};
pub use filter::{FilterVerdict, PolicyEngine, RequestFilter};
pub use request::{RequestOutcome, RequestRecord};
pub use transport::HostTransport;
pub use utils::config::FilterConfig;
pub use utils::errors::{FilterError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
