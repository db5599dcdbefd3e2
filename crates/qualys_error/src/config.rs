//! Configuration error types.

/// Ways connector settings can be unusable.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration layer could not be read, merged or deserialized
    #[display("Failed to load configuration: {}", _0)]
    Load(String),
    /// A setting was present but not acceptable
    #[display("Invalid {}: {}", key, reason)]
    InvalidValue {
        /// Setting name as it appears in `qualys.toml`
        key: String,
        /// What is wrong with it
        reason: String,
    },
    /// The selected collection steps cannot be ordered
    #[display("Invalid step plan: {}", _0)]
    StepPlan(String),
}

impl ConfigErrorKind {
    /// Setting that was rejected, if the error concerns a single key.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { key, .. } => Some(key),
            Self::Load(_) | Self::StepPlan(_) => None,
        }
    }
}

/// Configuration error with source location tracking.
///
/// # Examples
///
/// ```
/// use qualys_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::invalid("username", "must not be empty");
/// assert_eq!(err.kind.key(), Some("username"));
/// assert!(format!("{}", err).contains("Invalid username: must not be empty"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// The kind of error that occurred
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Rejected value for one setting.
    #[track_caller]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        })
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}
