//! Rate limiting for the Qualys API.
//!
//! Qualys enforces a per-subscription request quota and a concurrency cap,
//! and reports both on every response through `X-RateLimit-*` and
//! `X-Concurrency-Limit-*` headers. When either is exceeded it answers with
//! HTTP 409 and an advised wait.
//!
//! This crate keeps one [`RateLimitState`] per client, owned by a coordinating
//! task behind [`RateLimiter`], and wraps each call in [`RequestExecutor`],
//! which:
//! - pauses admissions while the budget is inside the reserve buffer or the
//!   provider advised a wait
//! - caps in-flight calls at the advertised concurrency
//! - folds response headers back into the state
//! - retries the throttle status after a fixed cooldown, up to `max_attempts`
//!
//! ```rust,ignore
//! use qualys_rate_limit::{RateLimiter, RateLimitConfig, RequestExecutor};
//!
//! let executor = RequestExecutor::new(RateLimiter::new(RateLimitConfig::default()));
//! let executed = executor.execute(endpoint, || http.get(&url).send()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod detector;
mod executor;
mod limiter;
mod observer;
mod response;
mod state;

pub use config::RateLimitConfig;
pub use detector::RateLimitHeaders;
pub use executor::{Executed, RequestExecutor};
pub use limiter::{RateLimiter, RateLimiterGuard};
pub use observer::{RateLimitObserver, TracingObserver};
pub use qualys_error::{RateLimitError, RateLimitErrorKind};
pub use response::ProviderResponse;
pub use state::RateLimitState;
