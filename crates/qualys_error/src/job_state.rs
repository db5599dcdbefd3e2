//! Job-state sink error types.

/// Kinds of job-state errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum JobStateErrorKind {
    /// An entity or relationship with this key was already added
    #[display("Duplicate key: {}", _0)]
    DuplicateKey(String),
    /// Failed to serialize collected data
    #[display("Failed to serialize job state: {}", _0)]
    Serialize(String),
    /// Failed to write collected data
    #[display("Failed to write {}: {}", path, message)]
    Write {
        /// Path being written
        path: String,
        /// I/O error message
        message: String,
    },
}

/// Job-state error with location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{JobStateError, JobStateErrorKind};
///
/// let err = JobStateError::new(JobStateErrorKind::DuplicateKey("qualys_host:1".to_string()));
/// assert!(format!("{}", err).contains("qualys_host:1"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Job State Error: {} at line {} in {}", kind, line, file)]
pub struct JobStateError {
    /// The kind of error that occurred
    pub kind: JobStateErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl JobStateError {
    /// Create a new JobStateError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: JobStateErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
