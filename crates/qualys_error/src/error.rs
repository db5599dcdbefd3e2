//! Top-level error wrapper types.

use crate::{ApiError, ConfigError, HttpError, JobStateError, ParseError, RateLimitError};

/// Every failure the connector can surface.
///
/// # Examples
///
/// ```
/// use qualys_error::{QualysError, HttpError, HttpErrorKind};
///
/// let http_err = HttpError::new(HttpErrorKind::ClientBuild("no TLS backend".to_string()));
/// let err: QualysError = http_err.into();
/// assert!(format!("{}", err).contains("HTTP Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum QualysErrorKind {
    /// Transport error
    #[from(HttpError)]
    Http(HttpError),
    /// Qualys API error
    #[from(ApiError)]
    Api(ApiError),
    /// Rate limiter error
    #[from(RateLimitError)]
    RateLimit(RateLimitError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Response decoding error
    #[from(ParseError)]
    Parse(ParseError),
    /// Job-state sink error
    #[from(JobStateError)]
    JobState(JobStateError),
}

/// Connector error with kind discrimination.
///
/// # Examples
///
/// ```
/// use qualys_error::{QualysResult, ConfigError};
///
/// fn might_fail() -> QualysResult<()> {
///     Err(ConfigError::invalid("api_url", "must not be empty"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Qualys Error: {}", _0)]
pub struct QualysError(Box<QualysErrorKind>);

impl QualysError {
    /// Create a new error from a kind.
    pub fn new(kind: QualysErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &QualysErrorKind {
        &self.0
    }

    /// API error details, when this is an API failure.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self.kind() {
            QualysErrorKind::Api(err) => Some(err),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to QualysErrorKind
impl<T> From<T> for QualysError
where
    T: Into<QualysErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for connector operations.
pub type QualysResult<T> = std::result::Result<T, QualysError>;
