//! Connector configuration.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. Bundled defaults (`qualys.toml` shipped with the crate)
//! 2. `~/.config/qualys/qualys.toml`
//! 3. `./qualys.toml`
//! 4. A file named on the command line
//! 5. `QUALYS_*` environment variables (`QUALYS_RATE_LIMIT__MAX_ATTEMPTS` for nested keys)
//! 6. Command-line flags
//!
//! Every file except the bundled defaults and an explicit `--config` is optional.

use chrono::{DateTime, TimeDelta, Utc};
use config::{Config, Environment, File, FileFormat};
use qualys_client::ClientConfig;
use qualys_error::{ConfigError, ConfigErrorKind, QualysError, QualysResult};
use qualys_rate_limit::RateLimitConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../qualys.toml");

/// Values given on the command line. `None` leaves the configured value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// API platform URL
    pub api_url: Option<String>,
    /// API user
    pub username: Option<String>,
    /// API password
    pub password: Option<String>,
}

/// Everything one collection run needs.
#[derive(Clone, PartialEq, Deserialize)]
pub struct ConnectorConfig {
    /// Base URL of the subscription's API platform
    pub api_url: String,
    /// API user
    #[serde(default)]
    pub username: String,
    /// API password
    #[serde(default)]
    pub password: String,
    /// Collect web app findings detected within this many days
    pub min_findings_since_days: u32,
    /// Collect hosts scanned within this many days
    pub min_scanned_since_days: u32,
    /// Host assets per search page
    pub host_page_size: u32,
    /// Host ids per detection request
    pub detection_batch_size: usize,
    /// QIDs per knowledge base request
    pub vulnerability_batch_size: usize,
    /// Throttle handling shared by every request
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("min_findings_since_days", &self.min_findings_since_days)
            .field("min_scanned_since_days", &self.min_scanned_since_days)
            .field("host_page_size", &self.host_page_size)
            .field("detection_batch_size", &self.detection_batch_size)
            .field("vulnerability_batch_size", &self.vulnerability_batch_size)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl ConnectorConfig {
    /// Load and validate configuration from every source.
    ///
    /// # Errors
    ///
    /// Fails when `file` is given but cannot be read, when any source does not
    /// parse, or when the merged configuration is invalid.
    #[instrument(skip(overrides))]
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> QualysResult<Self> {
        debug!("Loading configuration");

        let mut optional = Vec::new();
        if let Some(home) = dirs::home_dir() {
            optional.push(home.join(".config/qualys/qualys.toml"));
        }
        optional.push(PathBuf::from("qualys.toml"));

        Self::load_layered(
            &optional,
            file,
            Environment::with_prefix("QUALYS"),
            overrides,
        )
    }

    /// Load bundled defaults overridden by a single file, with no environment lookup.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or the result is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> QualysResult<Self> {
        Self::load_layered(
            &[],
            Some(path.as_ref()),
            Environment::with_prefix("QUALYS").source(Some(HashMap::new())),
            &ConfigOverrides::default(),
        )
    }

    pub(crate) fn load_layered(
        optional: &[PathBuf],
        file: Option<&Path>,
        environment: Environment,
        overrides: &ConfigOverrides,
    ) -> QualysResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        for path in optional {
            builder = builder.add_source(File::from(path.clone()).required(false));
        }
        if let Some(path) = file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            environment
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let builder = builder
            .set_override_option("api_url", overrides.api_url.clone())
            .and_then(|b| b.set_override_option("username", overrides.username.clone()))
            .and_then(|b| b.set_override_option("password", overrides.password.clone()))
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(format!("overrides: {}", e))))?;

        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings a run cannot use.
    pub fn validate(&self) -> QualysResult<()> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::invalid("username", "must not be empty").into());
        }
        if self.password.is_empty() {
            return Err(ConfigError::invalid("password", "must not be empty").into());
        }

        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| ConfigError::invalid("api_url", format!("{}: {}", self.api_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "api_url",
                format!("must use http or https, got {}", url.scheme()),
            )
            .into());
        }

        for (name, size) in [
            ("host_page_size", self.host_page_size as usize),
            ("detection_batch_size", self.detection_batch_size),
            ("vulnerability_batch_size", self.vulnerability_batch_size),
        ] {
            if size == 0 {
                return Err(ConfigError::invalid(name, "must be at least 1").into());
            }
        }

        self.rate_limit.validate().map_err(QualysError::from)
    }

    /// Oldest detection date of collected web app findings.
    pub fn findings_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::days(i64::from(self.min_findings_since_days))
    }

    /// Oldest scan date of collected hosts.
    pub fn scanned_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::days(i64::from(self.min_scanned_since_days))
    }

    /// Settings for the API client.
    pub fn client_config(&self) -> QualysResult<ClientConfig> {
        ClientConfig::builder()
            .api_url(self.api_url.trim_end_matches('/'))
            .username(self.username.as_str())
            .password(self.password.as_str())
            .rate_limit(self.rate_limit)
            .page_size(self.host_page_size)
            .detection_batch_size(self.detection_batch_size)
            .vulnerability_batch_size(self.vulnerability_batch_size)
            .build()
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Load(format!("client settings: {}", e))).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qualys_error::QualysErrorKind;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Environment::with_prefix("QUALYS").source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn credentials() -> ConfigOverrides {
        ConfigOverrides {
            username: Some("scanner".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_bundled_defaults() {
        let config = ConnectorConfig::load_layered(&[], None, env(&[]), &credentials()).unwrap();
        assert_eq!(config.api_url, "https://qualysapi.qualys.com");
        assert_eq!(config.min_findings_since_days, 14);
        assert_eq!(config.host_page_size, 100);
        assert_eq!(config.detection_batch_size, 1000);
        assert_eq!(config.vulnerability_batch_size, 500);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = ConnectorConfig::load_layered(&[], None, env(&[]), &ConfigOverrides::default())
            .unwrap_err();
        assert!(matches!(err.kind(), QualysErrorKind::Config(_)));
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_file_then_env_then_overrides() {
        let file = toml_file(
            r#"
            api_url = "https://qualysapi.qg2.apps.qualys.com"
            username = "from-file"
            password = "file-secret"
            host_page_size = 250

            [rate_limit]
            cooldown_period = 2500
            "#,
        );
        let environment = env(&[
            ("QUALYS_USERNAME", "from-env"),
            ("QUALYS_RATE_LIMIT__MAX_ATTEMPTS", "3"),
        ]);
        let overrides = ConfigOverrides {
            password: Some("cli-secret".to_string()),
            ..Default::default()
        };

        let config =
            ConnectorConfig::load_layered(&[], Some(file.path()), environment, &overrides).unwrap();
        assert_eq!(config.api_url, "https://qualysapi.qg2.apps.qualys.com");
        assert_eq!(config.username, "from-env");
        assert_eq!(config.password, "cli-secret");
        assert_eq!(config.host_page_size, 250);
        assert_eq!(config.rate_limit.cooldown_period, 2500);
        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.rate_limit.response_code, 409);
    }

    #[test]
    fn test_optional_files_may_be_missing() {
        let dir = tempfile::tempdir().unwrap();
        let optional = vec![dir.path().join("absent.toml")];
        let config =
            ConnectorConfig::load_layered(&optional, None, env(&[]), &credentials()).unwrap();
        assert_eq!(config.username, "scanner");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let result = ConnectorConfig::load_layered(&[], Some(&missing), env(&[]), &credentials());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let valid = ConnectorConfig::load_layered(&[], None, env(&[]), &credentials()).unwrap();

        let mut config = valid.clone();
        config.api_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = valid.clone();
        config.api_url = "ftp://qualysapi.qualys.com".to_string();
        assert!(config.validate().is_err());

        let mut config = valid.clone();
        config.detection_batch_size = 0;
        match config.validate().unwrap_err().kind() {
            QualysErrorKind::Config(err) => {
                assert_eq!(err.kind().key(), Some("detection_batch_size"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut config = valid.clone();
        config.rate_limit.max_attempts = 0;
        assert!(matches!(
            config.validate().unwrap_err().kind(),
            QualysErrorKind::RateLimit(_)
        ));

        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_client_config_carries_settings() {
        let mut config = ConnectorConfig::load_layered(&[], None, env(&[]), &credentials()).unwrap();
        config.api_url = "https://qualysapi.qualys.com/".to_string();
        config.host_page_size = 42;

        let client = config.client_config().unwrap();
        assert_eq!(client.api_url(), "https://qualysapi.qualys.com");
        assert_eq!(*client.page_size(), 42);
        assert_eq!(client.username(), "scanner");
    }

    #[test]
    fn test_since_windows() {
        let config = ConnectorConfig::load_layered(&[], None, env(&[]), &credentials()).unwrap();
        let now = DateTime::parse_from_rfc3339("2024-03-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            config.findings_since(now).to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectorConfig::load_layered(&[], None, env(&[]), &credentials()).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
