//! Hooks invoked at the executor's decision points.

use crate::RateLimitState;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observer invoked synchronously before admission, after each response, and
/// before each throttle retry.
///
/// All methods default to doing nothing, so implementors only override the
/// points they care about.
pub trait RateLimitObserver: Send + Sync {
    /// A call is about to wait `wait` before it may be dispatched.
    fn on_admission(&self, _endpoint: &str, _wait: Duration, _state: &RateLimitState) {}

    /// A response arrived and the shared state was updated.
    fn on_response(&self, _endpoint: &str, _status: u16, _state: &RateLimitState) {}

    /// A throttled call will be retried after `cooldown`.
    fn on_retry(&self, _endpoint: &str, _attempt: u32, _cooldown: Duration) {}
}

/// Observer that reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RateLimitObserver for TracingObserver {
    fn on_admission(&self, endpoint: &str, wait: Duration, state: &RateLimitState) {
        info!(
            endpoint,
            wait_ms = wait.as_millis() as u64,
            limit_remaining = state.limit_remaining,
            to_wait_seconds = state.to_wait_seconds,
            "Delaying request to respect rate limit"
        );
    }

    fn on_response(&self, endpoint: &str, status: u16, state: &RateLimitState) {
        debug!(
            endpoint,
            status,
            limit_remaining = state.limit_remaining,
            concurrency_running = state.concurrency_running,
            "Rate limit state updated"
        );
    }

    fn on_retry(&self, endpoint: &str, attempt: u32, cooldown: Duration) {
        warn!(
            endpoint,
            attempt,
            cooldown_ms = cooldown.as_millis() as u64,
            "Throttled by provider, will retry"
        );
    }
}
