//! Error types for the Qualys graph connector.
//!
//! This crate provides the foundation error types used by every crate in the
//! connector workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use qualys_error::{ApiError, ApiErrorKind, QualysResult};
//!
//! fn fetch_hosts() -> QualysResult<Vec<u64>> {
//!     Err(ApiError::new(ApiErrorKind::Request {
//!         status: 500,
//!         status_text: "Internal Server Error".to_string(),
//!         endpoint: "/qps/rest/2.0/search/am/hostasset".to_string(),
//!     }))?
//! }
//!
//! match fetch_hosts() {
//!     Ok(ids) => println!("Got {} hosts", ids.len()),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod error;
mod http;
mod job_state;
mod parse;
mod rate_limit;

pub use api::{ApiError, ApiErrorKind};
pub use config::{ConfigError, ConfigErrorKind};
pub use error::{QualysError, QualysErrorKind, QualysResult};
pub use http::{HttpError, HttpErrorKind};
pub use job_state::{JobStateError, JobStateErrorKind};
pub use parse::{ParseError, ParseErrorKind};
pub use rate_limit::{RateLimitError, RateLimitErrorKind};
