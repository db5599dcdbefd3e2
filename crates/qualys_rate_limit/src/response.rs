//! Minimal view of an HTTP response needed for rate limit bookkeeping.

use reqwest::header::HeaderMap;

/// What the executor needs to know about a response.
///
/// Implemented for [`reqwest::Response`]; tests supply their own.
pub trait ProviderResponse {
    /// Numeric HTTP status.
    fn status(&self) -> u16;

    /// Reason phrase for the status, empty when unknown.
    fn status_text(&self) -> String;

    /// Response headers.
    fn headers(&self) -> &HeaderMap;
}

impl ProviderResponse for reqwest::Response {
    fn status(&self) -> u16 {
        reqwest::Response::status(self).as_u16()
    }

    fn status_text(&self) -> String {
        reqwest::Response::status(self)
            .canonical_reason()
            .unwrap_or_default()
            .to_string()
    }

    fn headers(&self) -> &HeaderMap {
        reqwest::Response::headers(self)
    }
}
