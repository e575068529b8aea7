// src/request/record.rs
//! Request lifecycle record
//!
//! One record exists per inbound request, owned by the filter for the
//! request's duration and discarded when it completes. The external policy
//! engine reads it to make its decision and the capture/replay components
//! thread their state through it.

use crate::capture::CapturedBody;
use http::{Method, StatusCode};

/// Terminal outcome of a filtered request.
///
/// Exactly one terminal outcome is set before the record is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Hand the request back to the host for normal processing.
    Continue,

    /// Processing continues on a deferred completion notification.
    Pending,

    /// The client is being redirected away.
    Redirect,

    /// Access denied.
    Forbidden,

    /// The request could not be understood (for example no canonical URL).
    BadRequest,

    /// No handler for the requested resource.
    NotFound,

    /// The requested operation is not supported.
    NotImplemented,

    /// An internal failure aborted the request.
    InternalError,

    /// A response has already been written; finish the request.
    Done,
}

impl RequestOutcome {
    /// HTTP status to set before finishing the request, if any. `Continue`,
    /// `Pending` and `Done` leave the response status untouched.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            RequestOutcome::Continue | RequestOutcome::Pending | RequestOutcome::Done => None,
            RequestOutcome::Redirect => Some(StatusCode::FOUND),
            RequestOutcome::Forbidden => Some(StatusCode::FORBIDDEN),
            RequestOutcome::BadRequest => Some(StatusCode::BAD_REQUEST),
            RequestOutcome::NotFound => Some(StatusCode::NOT_FOUND),
            RequestOutcome::NotImplemented => Some(StatusCode::NOT_IMPLEMENTED),
            RequestOutcome::InternalError => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Short description used in logs and JSON envelopes.
    pub fn description(&self) -> &'static str {
        match self {
            RequestOutcome::Continue => "success",
            RequestOutcome::Pending => "pending",
            RequestOutcome::Redirect => "redirect",
            RequestOutcome::Forbidden => "forbidden",
            RequestOutcome::BadRequest => "bad request",
            RequestOutcome::NotFound => "not found",
            RequestOutcome::NotImplemented => "not implemented",
            RequestOutcome::InternalError => "internal error",
            RequestOutcome::Done => "done",
        }
    }
}

/// Per-request state shared with the external policy engine.
#[derive(Debug)]
pub struct RequestRecord {
    /// HTTP method of the inbound request.
    pub method: Method,

    /// Canonical original URL (`scheme://host:port/path?query`). Non-empty
    /// whenever the outcome is not `BadRequest`.
    pub orig_url: String,

    /// Portion of the path after the matched script segment, when derivable.
    pub path_info: Option<String>,

    /// Inbound content type, verbatim.
    pub content_type: Option<String>,

    /// Raw inbound `Cookie` header value, kept in sync with merges.
    pub cookies: Option<String>,

    /// Client IP, from the configured header or the transport peer address.
    pub client_ip: Option<String>,

    /// Client hostname, from the configured header.
    pub client_host: Option<String>,

    /// Captured entity body, if capture has run.
    pub body: CapturedBody,

    /// Target URL for preserved-body replay.
    pub replay_target: Option<String>,

    /// Terminal outcome. Starts as `InternalError` so an unset outcome is
    /// never mistaken for success.
    pub outcome: RequestOutcome,

    /// API-style caller: errors and redirects are delivered as JSON
    /// envelopes instead of browser responses.
    pub api_caller: bool,
}

impl RequestRecord {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            orig_url: String::new(),
            path_info: None,
            content_type: None,
            cookies: None,
            client_ip: None,
            client_host: None,
            body: CapturedBody::Absent,
            replay_target: None,
            outcome: RequestOutcome::InternalError,
            api_caller: false,
        }
    }
}
