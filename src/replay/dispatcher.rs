// src/replay/dispatcher.rs
//! Replay strategy selection and execution
//!
//! Two mutually exclusive strategies re-deliver a preserved body, selected by
//! content type: URL-encoded form bodies are rendered as an auto-submitting
//! HTML form (the browser performs the re-submission), everything else is
//! reissued through a cloned child exchange carrying the original method,
//! content type and entity body. API-style callers bypass both in favor of a
//! JSON envelope embedding the base64-encoded body, leaving the actual
//! resubmission to the caller.

use crate::capture::{CapturedBody, MappedBody};
use crate::replay::form::render_auto_submit_form;
use crate::replay::reinject::{open_preserved, reinject_body};
use crate::transport::{
    replace_request_header, CloneFlags, ExchangeHandle, ExecuteOutcome, HostTransport,
};
use crate::utils::errors::{FilterError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::{Method, StatusCode};
use metrics::counter;
use serde::Serialize;
use tracing::debug;

/// Content type handled by the form re-submission strategy.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A replay order: the preserved descriptor plus the original request shape.
#[derive(Debug)]
pub struct ReplayRequest<'a> {
    pub body: &'a CapturedBody,
    pub target_url: &'a str,
    pub content_type: &'a str,
    pub method: Method,

    /// Deliver a JSON envelope instead of performing the replay.
    pub api_caller: bool,

    /// Status text for the envelope.
    pub status_text: &'a str,
}

/// How the replay was carried out.
#[derive(Debug)]
pub enum ReplayOutcome {
    /// A response (form document or JSON envelope) was written; the request
    /// is done.
    Responded,

    /// The sub-request executed and completed synchronously; the child
    /// exchange has been released.
    Executed,

    /// The sub-request execution completes asynchronously; the caller owns
    /// the handle and must release it from its completion notification.
    ExecutionDeferred(ExchangeHandle),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationDataEnvelope<'a> {
    status: &'a str,
    location: &'a str,
    content_type: &'a str,
    data: String,
    code: u16,
}

/// Replay a preserved body against its target.
///
/// Returns the outcome together with the file mapping backing the replay, if
/// any; the caller must keep the mapping alive until the request completes
/// (the host may reference the mapped pages during deferred execution).
pub fn replay_preserved_body<T: HostTransport + ?Sized>(
    transport: &mut T,
    request: &ReplayRequest<'_>,
) -> Result<(ReplayOutcome, Option<MappedBody>)> {
    if request.target_url.is_empty() {
        return Err(FilterError::InvalidArgument("empty replay target".to_string()));
    }

    let mapped = open_preserved(request.body)?;
    let bytes: &[u8] = match (request.body, &mapped) {
        (CapturedBody::InMemory { data }, _) => data,
        (CapturedBody::FileBacked { .. }, Some(mapped)) => mapped.as_bytes(),
        _ => &[],
    };

    if request.api_caller {
        let envelope = LocationDataEnvelope {
            status: request.status_text,
            location: request.target_url,
            content_type: request.content_type,
            data: BASE64.encode(bytes),
            code: StatusCode::OK.as_u16(),
        };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| FilterError::InvalidArgument(format!("envelope serialization: {}", e)))?;

        transport.write_response(StatusCode::OK, "application/json", &payload)?;
        counter!("preserve_replay_envelope_total").increment(1);
        debug!("replay delivered as JSON envelope for {}", request.target_url);
        return Ok((ReplayOutcome::Responded, mapped));
    }

    if request.content_type.eq_ignore_ascii_case(FORM_URLENCODED) {
        let document = render_auto_submit_form(request.target_url, &request.method, bytes);
        transport.write_response(StatusCode::OK, "text/html", document.as_bytes())?;
        counter!("preserve_replay_form_total").increment(1);
        debug!("replay form issued for {}", request.target_url);
        return Ok((ReplayOutcome::Responded, mapped));
    }

    // All other content types are replayed in a sub-request.
    reinject_body(transport, bytes)?;
    replace_request_header(transport, "Content-Type", request.content_type)?;
    transport.set_request_method(&request.method)?;
    transport.set_request_url(request.target_url)?;

    let child = transport.clone_exchange(CloneFlags::ALL)?;
    let outcome = match transport.execute_exchange(child, request.target_url, &request.method) {
        Ok(outcome) => outcome,
        Err(e) => {
            // The clone must not leak when execution never starts.
            let _ = transport.release_exchange(child);
            return Err(e);
        }
    };

    counter!("preserve_replay_subrequest_total").increment(1);
    debug!(
        "sub-request replay of {} bytes to {}",
        bytes.len(),
        request.target_url
    );

    match outcome {
        ExecuteOutcome::Completed => {
            transport.release_exchange(child)?;
            Ok((ReplayOutcome::Executed, mapped))
        }
        ExecuteOutcome::Deferred => Ok((ReplayOutcome::ExecutionDeferred(child), mapped)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PreserveStore;
    use crate::transport::mock::MockTransport;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn memory_body(data: &'static [u8]) -> CapturedBody {
        CapturedBody::InMemory {
            data: Bytes::from_static(data),
        }
    }

    fn file_body(dir: &std::path::Path, data: &[u8]) -> CapturedBody {
        let store = PreserveStore::new(dir);
        let mut entry = store.create_entry().unwrap();
        entry.append(data).unwrap();
        let (path, length) = entry.finish();
        CapturedBody::FileBacked { path, length }
    }

    fn request<'a>(body: &'a CapturedBody, content_type: &'a str) -> ReplayRequest<'a> {
        ReplayRequest {
            body,
            target_url: "https://host/app/page",
            content_type,
            method: Method::POST,
            api_caller: false,
            status_text: "done",
        }
    }

    #[test]
    fn test_form_strategy_for_urlencoded() {
        let mut transport = MockTransport::new();
        let body = memory_body(b"a=1&b=two%20words");

        let (outcome, _) =
            replay_preserved_body(&mut transport, &request(&body, FORM_URLENCODED)).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Responded));
        let response = transport.last_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, "text/html");
        let html = String::from_utf8(response.body.clone()).unwrap();
        assert!(html.contains("name=\"b\" value=\"two words\""));
        assert!(transport.cloned.is_empty());
    }

    #[test]
    fn test_subrequest_strategy_for_other_content_types() {
        let dir = tempdir().unwrap();
        let mut transport = MockTransport::new();
        let payload = b"{\"key\":\"value\"}";
        let body = file_body(dir.path(), payload);

        let (outcome, mapped) =
            replay_preserved_body(&mut transport, &request(&body, "application/json")).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Executed));
        assert!(mapped.is_some());
        assert_eq!(transport.inserted_body.as_deref(), Some(&payload[..]));
        assert_eq!(
            transport.request_header("Content-Type"),
            Some("application/json".to_string())
        );
        assert_eq!(
            transport.request_header("Content-Length"),
            Some(payload.len().to_string())
        );
        assert_eq!(transport.rewritten_url.as_deref(), Some("https://host/app/page"));
        assert_eq!(transport.executed.len(), 1);
        assert_eq!(transport.executed[0].method, Method::POST);
        assert_eq!(transport.released.len(), 1);
    }

    #[test]
    fn test_subrequest_roundtrip_preserves_length() {
        let dir = tempdir().unwrap();
        let mut transport = MockTransport::new();
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let body = file_body(dir.path(), &payload);

        let mut req = request(&body, "application/octet-stream");
        req.method = Method::PUT;
        replay_preserved_body(&mut transport, &req).unwrap();

        assert_eq!(transport.inserted_body.as_deref(), Some(&payload[..]));
        assert_eq!(transport.rewritten_method, Some(Method::PUT));
    }

    #[test]
    fn test_deferred_execution_keeps_handle() {
        let mut transport = MockTransport::new();
        transport.execute_outcome = ExecuteOutcome::Deferred;
        let body = memory_body(b"data");

        let (outcome, _) =
            replay_preserved_body(&mut transport, &request(&body, "text/plain")).unwrap();

        match outcome {
            ReplayOutcome::ExecutionDeferred(handle) => {
                assert_eq!(transport.cloned, vec![handle]);
                assert!(transport.released.is_empty());
            }
            other => panic!("expected deferred execution, got {:?}", other),
        }
    }

    #[test]
    fn test_api_caller_gets_json_envelope() {
        let mut transport = MockTransport::new();
        let body = memory_body(b"a=1");
        let mut req = request(&body, FORM_URLENCODED);
        req.api_caller = true;

        let (outcome, _) = replay_preserved_body(&mut transport, &req).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Responded));
        let response = transport.last_response().unwrap();
        assert_eq!(response.content_type, "application/json");
        let envelope: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(envelope["location"], "https://host/app/page");
        assert_eq!(envelope["data"], BASE64.encode(b"a=1"));
        assert_eq!(envelope["code"], 200);
    }

    #[test]
    fn test_clone_failure_is_fatal() {
        let mut transport = MockTransport::new();
        transport.fail_clone = true;
        let body = memory_body(b"data");

        let err = replay_preserved_body(&mut transport, &request(&body, "text/plain")).unwrap_err();
        assert!(matches!(err, FilterError::HostOperation { .. }));
    }

    #[test]
    fn test_execute_failure_releases_clone() {
        let mut transport = MockTransport::new();
        transport.fail_execute = true;
        let body = memory_body(b"data");

        let err = replay_preserved_body(&mut transport, &request(&body, "text/plain")).unwrap_err();
        assert!(matches!(err, FilterError::HostOperation { .. }));
        assert_eq!(transport.released.len(), 1);
    }

    #[test]
    fn test_empty_target_rejected() {
        let mut transport = MockTransport::new();
        let body = memory_body(b"data");
        let mut req = request(&body, "text/plain");
        req.target_url = "";

        let err = replay_preserved_body(&mut transport, &req).unwrap_err();
        assert!(matches!(err, FilterError::InvalidArgument(_)));
    }
}
