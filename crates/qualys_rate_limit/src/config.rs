//! Static rate limit configuration.

use qualys_error::{RateLimitError, RateLimitErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and reserve settings fixed at client construction.
///
/// # Example
///
/// ```toml
/// [rate_limit]
/// response_code = 409
/// max_attempts = 5
/// reserve_limit = 30
/// cooldown_period = 1000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// HTTP status the provider uses to signal "throttled, retry"
    #[serde(default = "default_response_code")]
    pub response_code: u16,

    /// Total attempts allowed for one logical call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Requests kept unused to avoid racing the provider's own counter
    #[serde(default = "default_reserve_limit")]
    pub reserve_limit: u32,

    /// Milliseconds to wait before retrying a throttled call
    #[serde(default = "default_cooldown_period")]
    pub cooldown_period: u64,
}

fn default_response_code() -> u16 {
    409
}

fn default_max_attempts() -> u32 {
    5
}

fn default_reserve_limit() -> u32 {
    30
}

fn default_cooldown_period() -> u64 {
    1000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            response_code: default_response_code(),
            max_attempts: default_max_attempts(),
            reserve_limit: default_reserve_limit(),
            cooldown_period: default_cooldown_period(),
        }
    }
}

impl RateLimitConfig {
    /// Cooldown between throttled attempts.
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_period)
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }

    /// Reject configurations the executor cannot honor.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_attempts == 0 {
            return Err(RateLimitError::new(RateLimitErrorKind::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            )));
        }
        if !(400..=599).contains(&self.response_code) {
            return Err(RateLimitError::new(RateLimitErrorKind::InvalidConfig(format!(
                "response_code {} is not an HTTP error status",
                self.response_code
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.response_code, 409);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.reserve_limit, 30);
        assert_eq!(config.cooldown(), Duration::from_secs(1));
        assert_eq!(config.max_retries(), 4);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: RateLimitConfig = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.response_code, 409);
        assert_eq!(config.cooldown_period, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = RateLimitConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err.kind(), RateLimitErrorKind::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_success_status() {
        let config = RateLimitConfig {
            response_code: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
