//! Qualys API error types.

/// Error conditions reported by the Qualys API.
///
/// Every variant carries the endpoint so callers can log and decide without
/// holding on to the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ApiErrorKind {
    /// Credentials were rejected (401/403)
    #[display("Authentication failed for {} (HTTP {} {})", endpoint, status, status_text)]
    Authentication {
        /// HTTP status code
        status: u16,
        /// HTTP reason phrase
        status_text: String,
        /// Endpoint that rejected the request
        endpoint: String,
    },
    /// Provider throttle signal, eligible for retry
    #[display("Throttled by {} (HTTP {} {})", endpoint, status, status_text)]
    Throttled {
        /// HTTP status code
        status: u16,
        /// HTTP reason phrase
        status_text: String,
        /// Endpoint that throttled the request
        endpoint: String,
    },
    /// Throttle signal persisted past the attempt ceiling
    #[display(
        "Gave up on {} after {} attempts (HTTP {} {})",
        endpoint,
        attempts,
        status,
        status_text
    )]
    RetriesExhausted {
        /// HTTP status code of the last response
        status: u16,
        /// HTTP reason phrase of the last response
        status_text: String,
        /// Endpoint that kept throttling
        endpoint: String,
        /// Number of attempts made
        attempts: u32,
    },
    /// Any other non-success status
    #[display("Request to {} failed (HTTP {} {})", endpoint, status, status_text)]
    Request {
        /// HTTP status code
        status: u16,
        /// HTTP reason phrase
        status_text: String,
        /// Endpoint that failed
        endpoint: String,
    },
    /// A 2xx response whose `ServiceResponse` envelope reported a failure
    #[display("Unexpected response from {}: {}", endpoint, message)]
    UnexpectedResponse {
        /// Endpoint that answered
        endpoint: String,
        /// Provider-supplied response code or message
        message: String,
    },
}

impl ApiErrorKind {
    /// Classify a non-success status that is not the throttle signal.
    pub fn from_status(status: u16, status_text: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let status_text = status_text.into();
        let endpoint = endpoint.into();
        match status {
            401 | 403 => Self::Authentication {
                status,
                status_text,
                endpoint,
            },
            _ => Self::Request {
                status,
                status_text,
                endpoint,
            },
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Throttled { status, .. }
            | Self::RetriesExhausted { status, .. }
            | Self::Request { status, .. } => Some(*status),
            Self::UnexpectedResponse { .. } => None,
        }
    }

    /// Endpoint that produced this error.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Authentication { endpoint, .. }
            | Self::Throttled { endpoint, .. }
            | Self::RetriesExhausted { endpoint, .. }
            | Self::Request { endpoint, .. }
            | Self::UnexpectedResponse { endpoint, .. } => endpoint,
        }
    }

    /// Only the throttle signal is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Qualys API error with source location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{ApiError, ApiErrorKind};
///
/// let err = ApiError::new(ApiErrorKind::from_status(401, "Unauthorized", "/qps/rest/portal/version"));
/// assert!(matches!(err.kind, ApiErrorKind::Authentication { .. }));
/// assert_eq!(err.kind.status(), Some(401));
/// assert!(format!("{}", err).contains("/qps/rest/portal/version"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("API Error: {} at line {} in {}", kind, line, file)]
pub struct ApiError {
    /// The kind of error that occurred
    pub kind: ApiErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ApiError {
    /// Create a new ApiError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ApiErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }
}
