// src/request/url.rs
//! Canonical original-URL reconstruction
//!
//! The host transport exposes the request URL in fragments: a "cooked" URL
//! (`scheme://host:port/path?query` as perceived by the transport layer) and
//! optionally a "raw" host-local path as received on the wire. The cooked
//! path can differ from what the client sent (default-document resolution,
//! for example), so when a raw path is present the canonical URL is rebuilt
//! from the cooked `scheme://host:port` prefix plus the raw path.

use crate::transport::HostTransport;
use crate::utils::errors::{FilterError, Result};
use tracing::{debug, warn};

/// Result of URL reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedUrl {
    /// Canonical original URL; stable for the remainder of the request.
    pub orig_url: String,

    /// Path after the matched script segment, when derivable.
    pub path_info: Option<String>,
}

/// Reconstruct the canonical original URL and path-info for the current
/// request.
///
/// Fails with [`FilterError::InvalidRequest`] when the host exposes no cooked
/// URL; a path-info derivation failure is soft and only logged.
pub fn reconstruct_url<T: HostTransport + ?Sized>(transport: &T) -> Result<ReconstructedUrl> {
    let cooked = transport
        .cooked_url()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| FilterError::InvalidRequest("no pre-parsed request url".to_string()))?;

    debug!("pre-parsed request url: {}", cooked);

    let orig_url = match transport.raw_path().filter(|path| !path.is_empty()) {
        Some(raw) => {
            let rebuilt = rebuild_from_fragments(&cooked, &raw);
            debug!("reconstructed request url: {}", rebuilt);
            rebuilt
        }
        None => cooked,
    };

    let path_info = derive_path_info(transport);

    Ok(ReconstructedUrl { orig_url, path_info })
}

/// Combine the `scheme://host:port` prefix of the cooked URL with the raw
/// path. The prefix ends at the third `/` (two from `scheme://`, the third
/// marking the start of the path); if the cooked URL carried a query string
/// the raw path lacks, the query is re-appended.
fn rebuild_from_fragments(cooked: &str, raw: &str) -> String {
    let query = cooked.find('?').map(|pos| &cooked[pos..]);

    let prefix = match cooked.match_indices('/').nth(2) {
        Some((pos, _)) => &cooked[..pos],
        None => cooked,
    };

    let mut rebuilt = String::with_capacity(prefix.len() + raw.len());
    rebuilt.push_str(prefix);
    rebuilt.push_str(raw);

    if let Some(query) = query {
        if !rebuilt.contains('?') {
            rebuilt.push_str(query);
        }
    }

    rebuilt
}

/// Derive path-info by stripping the matched script segment. Requires both
/// the `PATH_INFO` and `SCRIPT_NAME` server variables; a script name that
/// does not occur in path-info is a soft failure.
fn derive_path_info<T: HostTransport + ?Sized>(transport: &T) -> Option<String> {
    let path_info = transport
        .server_variable("PATH_INFO")
        .filter(|v| !v.is_empty())?;
    let script_name = transport
        .server_variable("SCRIPT_NAME")
        .filter(|v| !v.is_empty())?;

    match path_info.find(&script_name) {
        Some(pos) => {
            let derived = path_info[pos + script_name.len()..].to_string();
            debug!("reconstructed path info: {}", derived);
            Some(derived)
        }
        None => {
            warn!(
                "script name {} not found in path info ({}), could not get the path info",
                script_name, path_info
            );
            None
        }
    }
}
