// src/request/cookies.rs
//! Inbound cookie merging
//!
//! When the filter issues a cookie on the response, downstream logic on this
//! same request (including the external policy engine) must already see it in
//! the inbound `Cookie` header, even though the client never sent it. The
//! merge is first-write-wins: a cookie name already present inbound is never
//! updated in place.

use crate::request::record::RequestRecord;
use crate::transport::{replace_request_header, HostTransport};
use crate::utils::errors::{FilterError, Result};
use tracing::{debug, warn};

/// Set `header` (a `name=value[; attributes...]` cookie) on the response and
/// fold it into the effective inbound `Cookie` header.
///
/// A header without both an `=` and a `;` delimiter is still set on the
/// response but is not eligible for merging.
pub fn set_cookie<T: HostTransport + ?Sized>(
    transport: &mut T,
    record: &mut RequestRecord,
    header: &str,
) -> Result<()> {
    if header.is_empty() {
        return Err(FilterError::InvalidArgument("empty cookie header".to_string()));
    }

    if let Err(e) = transport.set_response_header("Set-Cookie", header) {
        warn!("failed to set response header Set-Cookie value {}: {}", header, e);
        return Err(e);
    }

    let equals = header.find('=');
    let sep = header.find(';');
    let (eq_pos, sep_pos) = match (equals, sep) {
        (Some(eq_pos), Some(sep_pos)) if sep_pos > eq_pos + 1 => (eq_pos, sep_pos),
        // Not eligible for merging; the response cookie stands alone.
        _ => return Ok(()),
    };

    // `name=` including the delimiter, and `name=value` up to the first `;`.
    let name_key = &header[..=eq_pos];
    let name_value = &header[..sep_pos];

    match transport
        .server_variable("HTTP_COOKIE")
        .filter(|v| !v.is_empty())
    {
        None => {
            // No inbound Cookie header yet - the new cookie becomes it.
            replace_request_header(transport, "Cookie", name_value)?;
            record.cookies = Some(name_value.to_string());
            debug!("cookie header set to {}", name_value);
        }
        Some(current) if !current.contains(name_key) => {
            let merged = format!("{};{}", current, name_value);
            replace_request_header(transport, "Cookie", &merged)?;
            debug!("cookie header merged to {}", merged);
            record.cookies = Some(merged);
        }
        Some(_) => {
            // First write wins; leave the existing cookie untouched.
        }
    }

    Ok(())
}
