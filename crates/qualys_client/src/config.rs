//! Client configuration.

use derive_builder::Builder;
use derive_getters::Getters;
use qualys_rate_limit::RateLimitConfig;
use std::fmt;

/// Connection settings for one Qualys subscription.
///
/// # Example
///
/// ```
/// use qualys_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_url("https://qualysapi.qualys.com")
///     .username("scanner")
///     .password("secret")
///     .build()
///     .unwrap();
/// assert_eq!(*config.page_size(), 100);
/// ```
#[derive(Clone, Builder, Getters)]
#[builder(setter(into))]
pub struct ClientConfig {
    /// Base URL of the subscription's API platform
    api_url: String,
    /// API user
    username: String,
    /// API password
    password: String,
    /// Rate limiting applied to every call
    #[builder(default)]
    rate_limit: RateLimitConfig,
    /// Records requested per page from the QPS search endpoints
    #[builder(default = "100")]
    page_size: u32,
    /// Host ids per detection list request
    #[builder(default = "1000")]
    detection_batch_size: usize,
    /// QIDs per knowledge base request
    #[builder(default = "500")]
    vulnerability_batch_size: usize,
}

impl ClientConfig {
    /// Creates a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("rate_limit", &self.rate_limit)
            .field("page_size", &self.page_size)
            .field("detection_batch_size", &self.detection_batch_size)
            .field("vulnerability_batch_size", &self.vulnerability_batch_size)
            .finish()
    }
}
