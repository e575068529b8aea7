// src/request/mod.rs
//! Request lifecycle state
//!
//! - **Record**: the per-request data structure threading state between the
//!   capture pipeline, replay dispatcher and the external policy engine
//! - **Url**: canonical original-URL reconstruction from host fragments
//! - **Cookies**: folding newly issued cookies into the inbound header

pub mod cookies;
pub mod record;
pub mod url;

// Re-export commonly used types
pub use cookies::set_cookie;
pub use record::{RequestOutcome, RequestRecord};
pub use url::{reconstruct_url, ReconstructedUrl};
