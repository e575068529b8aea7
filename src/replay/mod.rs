// src/replay/mod.rs
//! Preserved-body replay
//!
//! Re-delivers a previously captured body to the now-redirected target:
//!
//! - **Form**: auto-submitting HTML form for URL-encoded bodies; the
//!   client's browser performs the actual re-submission
//! - **Reinject**: places the preserved bytes back into the current exchange
//!   as its entity body
//! - **Dispatcher**: strategy selection, sub-request execution and the JSON
//!   envelope for API-style callers

pub mod dispatcher;
pub mod form;
pub mod reinject;

// Re-export commonly used types
pub use dispatcher::{replay_preserved_body, ReplayOutcome, ReplayRequest, FORM_URLENCODED};
pub use form::render_auto_submit_form;
pub use reinject::{open_preserved, reinject_body};
