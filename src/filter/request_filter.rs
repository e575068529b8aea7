// src/filter/request_filter.rs
//! Request filter driver and policy-engine hooks

use crate::capture::{
    capture_body, BodyClassifier, CapturedBody, EntryGuard, MappedBody, MarkerClassifier,
    PreserveStore,
};
use crate::replay::dispatcher::{replay_preserved_body, ReplayOutcome, ReplayRequest};
use crate::request::cookies::set_cookie;
use crate::request::record::{RequestOutcome, RequestRecord};
use crate::request::url::reconstruct_url;
use crate::transport::{ExchangeHandle, HostTransport};
use crate::utils::config::FilterConfig;
use crate::utils::errors::{FilterError, Result};
use http::StatusCode;
use metrics::counter;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// What the host should do with the request once the filter is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Hand the request back for normal processing.
    Continue,

    /// Wait for an asynchronous completion notification.
    Pending,

    /// Finish the request, setting the given status first when present (a
    /// response may already have been written).
    Finish(Option<StatusCode>),
}

/// The external policy-decision engine.
///
/// Receives the populated lifecycle record through the filter and may invoke
/// the filter's callback hooks (`capture_body`, `set_preserved_body_target`,
/// `merge_cookie`, `emit_custom_response`) while deciding. The decision is
/// expressed by setting the record's terminal outcome.
pub trait PolicyEngine {
    fn decide<T: HostTransport>(&mut self, filter: &mut RequestFilter<'_, T>);
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    status: &'a str,
    data: &'a str,
    code: u16,
}

#[derive(Serialize)]
struct LocationEnvelope<'a> {
    status: &'a str,
    location: &'a str,
    code: u16,
}

/// Per-request filter instance.
///
/// Created when the host delivers a request, discarded when the request
/// completes; dropping it releases every resource the request acquired.
pub struct RequestFilter<'a, T: HostTransport> {
    transport: &'a mut T,
    config: &'a FilterConfig,
    classifier: Box<dyn BodyClassifier>,
    record: RequestRecord,
    guard: Option<EntryGuard>,
    mapped: Option<MappedBody>,
    cloned: Option<ExchangeHandle>,
}

impl<'a, T: HostTransport> RequestFilter<'a, T> {
    /// Populate the lifecycle record from the inbound request.
    pub fn begin(transport: &'a mut T, config: &'a FilterConfig) -> Self {
        let mut record = RequestRecord::new(transport.request_method());
        record.content_type = transport.server_variable("CONTENT_TYPE");
        record.cookies = transport.server_variable("HTTP_COOKIE");

        record.client_ip = config
            .client_ip_header
            .as_deref()
            .and_then(|header| transport.server_variable(header))
            .filter(|v| !v.is_empty())
            .or_else(|| transport.remote_addr().map(|ip| ip.to_string()));
        record.client_host = config
            .client_hostname_header
            .as_deref()
            .and_then(|header| transport.server_variable(header));

        counter!("preserve_requests_total").increment(1);

        Self {
            transport,
            config,
            classifier: Box::new(MarkerClassifier::default()),
            record,
            guard: None,
            mapped: None,
            cloned: None,
        }
    }

    /// Swap the body classifier (the production marker probe by default).
    pub fn set_classifier(&mut self, classifier: Box<dyn BodyClassifier>) {
        self.classifier = classifier;
    }

    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut RequestRecord {
        &mut self.record
    }

    /// Run the request through URL reconstruction and the policy engine,
    /// returning the host verdict.
    pub fn run<P: PolicyEngine>(&mut self, policy: &mut P) -> FilterVerdict {
        match reconstruct_url(&*self.transport) {
            Ok(url) => {
                self.record.orig_url = url.orig_url;
                self.record.path_info = url.path_info;
            }
            Err(e) => {
                error!("request url reconstruction failed: {}", e);
                self.record.outcome = RequestOutcome::BadRequest;
                return self.verdict();
            }
        }

        policy.decide(self);
        self.verdict()
    }

    /// Release the cloned exchange from a deferred completion notification.
    pub fn on_async_completion(&mut self) -> FilterVerdict {
        if let Some(handle) = self.cloned.take() {
            if let Err(e) = self.transport.release_exchange(handle) {
                warn!("failed to release cloned exchange: {}", e);
            }
        }
        FilterVerdict::Continue
    }

    /// Complete the request, tearing down per-request resources.
    pub fn finish(self) {
        // Drop runs the actual teardown.
    }

    // ---- hooks exposed to the policy engine ----

    /// Capture the inbound entity body into the lifecycle record.
    pub fn capture_body(&mut self) -> Result<()> {
        let store = self.config.preserve_dir.clone().map(PreserveStore::new);
        let body = capture_body(&mut *self.transport, store.as_ref(), self.classifier.as_ref())?;

        if let CapturedBody::FileBacked { path, .. } = &body {
            // The filter owns deletion unless the policy engine retains the
            // entry for a later request.
            self.guard = Some(EntryGuard::new(path.clone()));
        }
        self.record.body = body;
        Ok(())
    }

    /// Record the target URL for preserved-body replay.
    pub fn set_preserved_body_target(&mut self, url: impl Into<String>) {
        self.record.replay_target = Some(url.into());
    }

    /// Set a response cookie and fold it into the inbound cookie header.
    pub fn merge_cookie(&mut self, value: &str) -> Result<()> {
        set_cookie(&mut *self.transport, &mut self.record, value)
    }

    /// Adopt a storage entry preserved by an earlier request as this
    /// request's captured body. The entry is deleted when this request
    /// completes unless [`retain_preserved_file`](Self::retain_preserved_file)
    /// is called.
    pub fn set_preserved_body_file(&mut self, path: PathBuf) -> Result<()> {
        let length = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                // An unreadable entry is unusable; do not leave it behind.
                crate::capture::storage::remove_entry(&path);
                return Err(FilterError::StorageFailed(format!(
                    "unable to open preservation file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        self.guard = Some(EntryGuard::new(path.clone()));
        self.record.body = CapturedBody::FileBacked { path, length };
        Ok(())
    }

    /// Keep the preserved storage entry past this request's lifetime.
    pub fn retain_preserved_file(&mut self) {
        if let Some(guard) = self.guard.as_mut() {
            guard.disarm();
        }
    }

    /// Emit the decision response. Behavior is keyed on the record's current
    /// outcome: a pending replay target dispatches the replay, a redirect
    /// sets the `Location` header, anything else writes `text` directly with
    /// the outcome's status.
    pub fn emit_custom_response(&mut self, text: &str, content_type: &str) -> Result<()> {
        if self.record.replay_target.is_some() {
            return self.dispatch_replay(content_type);
        }

        if self.record.api_caller {
            return self.emit_api_response(text);
        }

        if self.record.outcome == RequestOutcome::Redirect {
            if let Err(e) = self.transport.set_response_header("Location", text) {
                error!("failed to issue a redirect to {}: {}", text, e);
                self.record.outcome = RequestOutcome::InternalError;
                return Err(e);
            }
            debug!("redirecting to {}", text);
            return Ok(());
        }

        let status = self.record.outcome.http_status().unwrap_or(StatusCode::OK);
        let content_type = if content_type.is_empty() { "text/html" } else { content_type };
        self.transport.write_response(status, content_type, text.as_bytes())?;
        self.record.outcome = RequestOutcome::Done;
        Ok(())
    }

    /// Replay the preserved body against the recorded target.
    fn dispatch_replay(&mut self, content_type: &str) -> Result<()> {
        let result = {
            let request = ReplayRequest {
                body: &self.record.body,
                target_url: self.record.replay_target.as_deref().unwrap_or(""),
                content_type: if content_type.is_empty() {
                    self.record.content_type.as_deref().unwrap_or("")
                } else {
                    content_type
                },
                method: self.record.method.clone(),
                api_caller: self.record.api_caller,
                status_text: self.record.outcome.description(),
            };
            replay_preserved_body(&mut *self.transport, &request)
        };

        match result {
            Ok((outcome, mapped)) => {
                self.mapped = mapped;
                self.record.outcome = match outcome {
                    ReplayOutcome::Responded => RequestOutcome::Done,
                    ReplayOutcome::Executed => RequestOutcome::Continue,
                    ReplayOutcome::ExecutionDeferred(handle) => {
                        self.cloned = Some(handle);
                        RequestOutcome::Pending
                    }
                };
                Ok(())
            }
            Err(e) => {
                error!("preserved body replay failed: {}", e);
                self.record.outcome = RequestOutcome::InternalError;
                Err(e)
            }
        }
    }

    /// Deliver a redirect or plain decision to an API-style caller as a JSON
    /// envelope.
    fn emit_api_response(&mut self, text: &str) -> Result<()> {
        let status_text = self.record.outcome.description();

        let (payload, status) = if self.record.outcome == RequestOutcome::Redirect {
            let envelope = LocationEnvelope {
                status: status_text,
                location: text,
                code: StatusCode::FOUND.as_u16(),
            };
            let status = StatusCode::from_u16(self.config.effective_json_redirect_code())
                .unwrap_or(StatusCode::FORBIDDEN);
            (serde_json::to_vec(&envelope), status)
        } else {
            let envelope = ErrorEnvelope {
                status: status_text,
                data: text,
                code: StatusCode::OK.as_u16(),
            };
            (serde_json::to_vec(&envelope), StatusCode::OK)
        };

        let payload = payload
            .map_err(|e| FilterError::InvalidArgument(format!("envelope serialization: {}", e)))?;
        self.transport.write_response(status, "application/json", &payload)?;
        self.record.outcome = RequestOutcome::Done;
        Ok(())
    }

    // ---- outcome mapping ----

    /// Map the terminal outcome onto the host verdict, rewriting error
    /// statuses as JSON envelopes for API-style callers.
    fn verdict(&mut self) -> FilterVerdict {
        let outcome = self.record.outcome;
        debug!("exit status: {}", outcome.description());

        if let Some(status) = outcome.http_status() {
            if self.record.api_caller && status.as_u16() > 302 {
                let envelope = ErrorEnvelope {
                    status: outcome.description(),
                    data: "",
                    code: status.as_u16(),
                };
                match serde_json::to_vec(&envelope) {
                    Ok(payload) => {
                        if let Err(e) =
                            self.transport
                                .write_response(StatusCode::OK, "application/json", &payload)
                        {
                            warn!("failed to write error envelope: {}", e);
                        }
                    }
                    Err(e) => warn!("failed to serialize error envelope: {}", e),
                }
                return FilterVerdict::Finish(None);
            }
        }

        match outcome {
            RequestOutcome::Continue => FilterVerdict::Continue,
            RequestOutcome::Pending => FilterVerdict::Pending,
            other => FilterVerdict::Finish(other.http_status()),
        }
    }
}

impl<T: HostTransport> Drop for RequestFilter<'_, T> {
    fn drop(&mut self) {
        // A still-pending cloned exchange must be released exactly once.
        if let Some(handle) = self.cloned.take() {
            if let Err(e) = self.transport.release_exchange(handle) {
                warn!("failed to release cloned exchange at end of request: {}", e);
            }
        }
        // The mapping drops before the guard deletes the file.
        self.mapped = None;
        self.guard = None;
    }
}
