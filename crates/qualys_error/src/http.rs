//! Transport error types.

/// Network-level failures talking to the Qualys platform.
///
/// None of these are retried by the request executor; only the provider's
/// throttle status is.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum HttpErrorKind {
    /// The underlying `reqwest` client could not be constructed
    #[display("Failed to build HTTP client: {}", _0)]
    ClientBuild(String),
    /// Connection refused, TLS failure or timeout before a status arrived
    #[display("Request to {} failed: {}", endpoint, reason)]
    Send {
        /// Endpoint being called
        endpoint: String,
        /// Transport error message
        reason: String,
    },
    /// A status arrived but the body could not be read
    #[display("Failed to read response body from {}: {}", endpoint, reason)]
    Body {
        /// Endpoint being called
        endpoint: String,
        /// Transport error message
        reason: String,
    },
}

impl HttpErrorKind {
    /// Endpoint the failure happened on, if a call was in progress.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::ClientBuild(_) => None,
            Self::Send { endpoint, .. } | Self::Body { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Transport error with source location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{HttpError, HttpErrorKind};
///
/// let err = HttpError::new(HttpErrorKind::Send {
///     endpoint: "/qps/rest/portal/version".to_string(),
///     reason: "connection refused".to_string(),
/// });
/// assert_eq!(err.kind.endpoint(), Some("/qps/rest/portal/version"));
/// assert!(format!("{}", err).contains("connection refused"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("HTTP Error: {} at line {} in {}", kind, line, file)]
pub struct HttpError {
    /// The kind of error that occurred
    pub kind: HttpErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl HttpError {
    /// Create a new HttpError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: HttpErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &HttpErrorKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_reported_for_calls() {
        let send = HttpErrorKind::Send {
            endpoint: "/api/2.0/fo/knowledge_base/vuln/".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(send.endpoint(), Some("/api/2.0/fo/knowledge_base/vuln/"));

        let body = HttpError::new(HttpErrorKind::Body {
            endpoint: "/qps/rest/3.0/search/was/webapp".to_string(),
            reason: "connection reset".to_string(),
        });
        let rendered = body.to_string();
        assert!(rendered.contains("/qps/rest/3.0/search/was/webapp"));
        assert!(rendered.contains("connection reset"));
        assert!(rendered.contains("http.rs"));

        let build = HttpErrorKind::ClientBuild("no TLS backend".to_string());
        assert_eq!(build.endpoint(), None);
    }
}
