//! Extraction of rate limit information from Qualys response headers.
//!
//! Qualys reports quota and concurrency usage on every API response:
//! - `X-RateLimit-Limit`: requests allowed per window
//! - `X-RateLimit-Window-Sec`: width of the window
//! - `X-RateLimit-Remaining`: requests left in the window
//! - `X-RateLimit-ToWait-Sec`: seconds to wait before the next call
//! - `X-Concurrency-Limit-Limit`: simultaneous calls allowed
//! - `X-Concurrency-Limit-Running`: simultaneous calls in progress

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const LIMIT: &str = "x-ratelimit-limit";
const WINDOW_SECONDS: &str = "x-ratelimit-window-sec";
const REMAINING: &str = "x-ratelimit-remaining";
const TO_WAIT_SECONDS: &str = "x-ratelimit-towait-sec";
const CONCURRENCY_LIMIT: &str = "x-concurrency-limit-limit";
const CONCURRENCY_RUNNING: &str = "x-concurrency-limit-running";

/// Rate limit values parsed from one response. Absent headers stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit`
    pub limit: Option<u32>,
    /// `X-RateLimit-Window-Sec`
    pub window_seconds: Option<u32>,
    /// `X-RateLimit-Remaining`
    pub remaining: Option<u32>,
    /// `X-RateLimit-ToWait-Sec`
    pub to_wait_seconds: Option<u32>,
    /// `X-Concurrency-Limit-Limit`
    pub concurrency_limit: Option<u32>,
    /// `X-Concurrency-Limit-Running`
    pub concurrency_running: Option<u32>,
}

impl RateLimitHeaders {
    /// Parse whichever rate limit headers are present.
    #[instrument(skip(headers))]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let detected = Self {
            limit: parse_header_u32(headers, LIMIT),
            window_seconds: parse_header_u32(headers, WINDOW_SECONDS),
            remaining: parse_header_u32(headers, REMAINING),
            to_wait_seconds: parse_header_u32(headers, TO_WAIT_SECONDS),
            concurrency_limit: parse_header_u32(headers, CONCURRENCY_LIMIT),
            concurrency_running: parse_header_u32(headers, CONCURRENCY_RUNNING),
        };
        debug!(?detected, "Parsed rate limit headers");
        detected
    }

    /// True when the response carried no rate limit headers at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Helper to parse u32 from header value.
fn parse_header_u32(headers: &HeaderMap, key: &str) -> Option<u32> {
    headers.get(key)?.to_str().ok()?.trim().parse().ok()
}
