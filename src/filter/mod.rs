// src/filter/mod.rs
//! Per-request filter driver
//!
//! Owns the request lifecycle record for the duration of one inbound
//! request, exposes the callback hooks the external policy engine may
//! invoke, maps the terminal outcome onto the host notification, and tears
//! down every per-request resource (memory mapping, storage entry, cloned
//! exchange) exactly once when the request completes.

pub mod request_filter;

// Re-export commonly used types
pub use request_filter::{FilterVerdict, PolicyEngine, RequestFilter};
