// src/observability/mod.rs
//! Tracing initialization
//!
//! Diagnostics go only to the operational log, never into response bodies.
//! The host decides where the log ends up; this module only wires up the
//! subscriber.

use crate::utils::errors::{FilterError, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// The filter is taken from `RUST_LOG` (defaulting to `info`); set
/// `PRESERVE_LOG_JSON=1` for line-delimited JSON output.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("PRESERVE_LOG_JSON").map(|v| v == "1").unwrap_or(false);

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    result.map_err(|e| FilterError::ConfigError(format!("failed to initialize tracing: {}", e)))
}
