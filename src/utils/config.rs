// src/utils/config.rs
//! Filter configuration
//!
//! One `FilterConfig` is handed to each request-handling call; there is no
//! process-wide registration. The host-integration layer owns the lifetime of
//! the configuration object.

use crate::utils::errors::{FilterError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for the preservation engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Directory for preserved request bodies. Required only when a capture
    /// spills to storage; memory-resident captures work without it.
    pub preserve_dir: Option<PathBuf>,

    /// Request header carrying the client IP, if the deployment sits behind
    /// a proxy. Falls back to the transport's remote address.
    pub client_ip_header: Option<String>,

    /// Request header carrying the client hostname.
    pub client_hostname_header: Option<String>,

    /// HTTP status code used when delivering a redirect to an API-style
    /// caller as a JSON envelope. Invalid codes fall back to 403.
    pub json_redirect_code: Option<u16>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            preserve_dir: None,
            client_ip_header: None,
            client_hostname_header: None,
            json_redirect_code: None,
        }
    }
}

impl FilterConfig {
    /// Load configuration from `preserve.{toml,yaml,json}` in the working
    /// directory (optional) overlaid with `PRESERVE_`-prefixed environment
    /// variables.
    pub fn load() -> Result<Self> {
        Self::load_from("preserve")
    }

    /// Load configuration from a named file (without extension) plus the
    /// environment overlay.
    pub fn load_from(name: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(config::Environment::with_prefix("PRESERVE"))
            .build()
            .map_err(|e| FilterError::ConfigError(format!("failed to load configuration: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| FilterError::ConfigError(format!("invalid configuration: {}", e)))
    }

    /// Effective status code for the API-caller redirect envelope.
    pub fn effective_json_redirect_code(&self) -> u16 {
        match self.json_redirect_code {
            Some(code) if (100..=599).contains(&code) => code,
            Some(code) => {
                tracing::warn!(
                    "configured json redirect code {} is not a valid HTTP status, using 403",
                    code
                );
                403
            }
            None => 403,
        }
    }
}
