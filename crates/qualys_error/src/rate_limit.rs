//! Error types for rate limiting operations.

/// Error kinds for rate limiting operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum RateLimitErrorKind {
    /// Invalid rate limit configuration.
    #[display("Invalid rate limit configuration: {}", _0)]
    InvalidConfig(String),
    /// The task that owns the rate limit state has stopped.
    #[display("Rate limit coordinator is no longer running")]
    CoordinatorClosed,
}

/// Rate limiting error with location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{RateLimitError, RateLimitErrorKind};
///
/// let err = RateLimitError::new(RateLimitErrorKind::CoordinatorClosed);
/// assert_eq!(err.kind(), &RateLimitErrorKind::CoordinatorClosed);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Rate Limit Error: {} at line {} in {}", kind, line, file)]
pub struct RateLimitError {
    kind: RateLimitErrorKind,
    line: u32,
    file: &'static str,
}

impl RateLimitError {
    /// Create a new rate limiting error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RateLimitErrorKind {
        &self.kind
    }
}
