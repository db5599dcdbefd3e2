//! Response decoding errors.

/// Kinds of decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ParseErrorKind {
    /// JSON body could not be decoded
    #[display("Invalid JSON from {}: {}", endpoint, message)]
    Json {
        /// Endpoint that produced the body
        endpoint: String,
        /// Decoder message
        message: String,
    },
    /// XML body could not be decoded
    #[display("Invalid XML from {}: {}", endpoint, message)]
    Xml {
        /// Endpoint that produced the body
        endpoint: String,
        /// Decoder message
        message: String,
    },
    /// Body decoded but a required element was absent
    #[display("Missing field '{}' in response from {}", field, endpoint)]
    MissingField {
        /// Endpoint that produced the body
        endpoint: String,
        /// Name of the missing field
        field: String,
    },
}

/// Decoding error with location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{ParseError, ParseErrorKind};
///
/// let err = ParseError::new(ParseErrorKind::MissingField {
///     endpoint: "/qps/rest/3.0/search/was/webapp".to_string(),
///     field: "ServiceResponse".to_string(),
/// });
/// assert!(format!("{}", err).contains("ServiceResponse"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Parse Error: {} at line {} in {}", kind, line, file)]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ParseError {
    /// Create a new ParseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ParseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
