// src/utils/mod.rs
//! Common utilities
//!
//! - **Errors**: crate-wide error taxonomy and `Result` alias
//! - **Config**: filter configuration loading

pub mod config;
pub mod errors;

// Re-export commonly used types
pub use config::FilterConfig;
pub use errors::{FilterError, Result};
