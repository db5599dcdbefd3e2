//! Shared rate limit bookkeeping.

use crate::{RateLimitConfig, RateLimitHeaders};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rate limit state shared by every request issued through one client.
///
/// The state is owned by the limiter's coordinating task; callers only ever
/// see snapshots of it.
///
/// `limit_remaining` is advisory. It is refreshed from the `X-RateLimit-Remaining`
/// header when a response carries one and decremented locally otherwise, so it
/// can drift from the provider's own counter until the next header arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Maximum requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub limit_remaining: u32,
    /// Width of the quota window
    pub limit_window_seconds: u32,
    /// Server-advised delay before the next call is safe
    pub to_wait_seconds: u32,
    /// Maximum simultaneous in-flight requests
    pub concurrency: u32,
    /// Requests currently in flight
    pub concurrency_running: u32,
}

impl Default for RateLimitState {
    /// Conservative defaults matching the Qualys standard subscription.
    fn default() -> Self {
        Self {
            limit: 300,
            limit_remaining: 300,
            limit_window_seconds: 3600,
            to_wait_seconds: 0,
            concurrency: 2,
            concurrency_running: 0,
        }
    }
}

impl RateLimitState {
    /// Requests usable before dipping into the reserve buffer.
    pub fn usable_budget(&self, config: &RateLimitConfig) -> i64 {
        i64::from(self.limit_remaining) - i64::from(config.reserve_limit)
    }

    /// True when the remaining budget is at or below the reserve buffer.
    pub fn budget_exhausted(&self, config: &RateLimitConfig) -> bool {
        self.usable_budget(config) <= 0
    }

    /// True when another request may be dispatched right now.
    pub fn has_free_slot(&self) -> bool {
        self.concurrency_running < self.concurrency
    }

    /// Fold response headers into the state.
    ///
    /// Our own in-flight count is authoritative for `concurrency_running`; the
    /// provider's running count includes other clients and is only logged.
    /// A lowered concurrency limit never drops below what is already in
    /// flight, so `concurrency_running <= concurrency` keeps holding.
    pub fn apply_headers(&mut self, headers: &RateLimitHeaders) {
        if let Some(limit) = headers.limit {
            self.limit = limit;
        }
        if let Some(window) = headers.window_seconds {
            self.limit_window_seconds = window;
        }
        match headers.remaining {
            Some(remaining) => self.limit_remaining = remaining,
            None => self.apply_local_decrement(),
        }
        // An absent ToWait-Sec means the provider no longer asks for a pause.
        self.to_wait_seconds = headers.to_wait_seconds.unwrap_or(0);
        if let Some(concurrency) = headers.concurrency_limit {
            self.concurrency = concurrency.max(self.concurrency_running).max(1);
        }
        if let Some(running) = headers.concurrency_running {
            debug!(
                provider_running = running,
                local_running = self.concurrency_running,
                "Provider reported concurrency usage"
            );
        }
    }

    /// Known approximation: without headers we assume the call cost one request.
    pub fn apply_local_decrement(&mut self) {
        self.limit_remaining = self.limit_remaining.saturating_sub(1);
    }
}
