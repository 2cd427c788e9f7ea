//! Secmap Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the secmap pipeline.
//!
//! # Overview
//!
//! This crate provides common functionality used across the secmap workspace
//! members:
//!
//! - **Error Handling**: the `SecmapError` type and `Result` alias
//! - **Logging**: tracing-based logging configuration and initialization
//! - **Types**: shared domain types (tabular section rows, publish pointer)
//!
//! # Example
//!
//! ```no_run
//! use secmap_common::{Result, SecmapError};
//!
//! fn parse_code(raw: &str) -> Result<String> {
//!     let code = raw.trim();
//!     if code.is_empty() {
//!         return Err(SecmapError::Csv("empty CUSEC code".to_string()));
//!     }
//!     Ok(code.to_string())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SecmapError};
