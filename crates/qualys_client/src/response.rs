//! JSON envelope returned by the QPS REST endpoints.

use crate::lenient;
use derive_getters::Getters;
use qualys_error::{ParseError, ParseErrorKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const SUCCESS: &str = "SUCCESS";

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "ServiceResponse")]
    service_response: ServiceResponse,
}

/// Error details attached to a non-`SUCCESS` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct ResponseErrorDetails {
    /// Human readable message
    #[serde(default)]
    error_message: Option<String>,
    /// Suggested fix
    #[serde(default)]
    error_resolution: Option<String>,
}

/// One page of a QPS search.
///
/// Records arrive wrapped in a single-key object naming their type, e.g.
/// `{"WebApp": {...}}`; [`ServiceResponse::records`] unwraps them.
#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    /// `SUCCESS` or an error code such as `INVALID_REQUEST`
    response_code: String,
    /// Records on this page
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    count: Option<u64>,
    /// True when another page exists
    #[serde(default, deserialize_with = "lenient::flag")]
    has_more_records: bool,
    /// Highest id on this page, for id paging
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    last_id: Option<u64>,
    /// Raw record wrappers
    #[serde(default)]
    data: Vec<Map<String, Value>>,
    /// Present when `response_code` is not `SUCCESS`
    #[serde(default)]
    response_error_details: Option<ResponseErrorDetails>,
}

impl ServiceResponse {
    /// Decode a response body.
    pub fn parse(endpoint: &str, body: &str) -> Result<Self, ParseError> {
        serde_json::from_str::<Envelope>(body)
            .map(|envelope| envelope.service_response)
            .map_err(|e| {
                ParseError::new(ParseErrorKind::Json {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })
            })
    }

    /// True when the call succeeded.
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS
    }

    /// Best available description of a failure.
    pub fn error_message(&self) -> String {
        self.response_error_details
            .as_ref()
            .and_then(|details| details.error_message.clone())
            .unwrap_or_else(|| self.response_code.clone())
    }

    /// Decode every record wrapped under `tag`. Wrappers with other tags are skipped.
    pub fn records<T: DeserializeOwned>(&self, endpoint: &str, tag: &str) -> Result<Vec<T>, ParseError> {
        self.data
            .iter()
            .filter_map(|wrapper| wrapper.get(tag))
            .map(|value| {
                T::deserialize(value).map_err(|e| {
                    ParseError::new(ParseErrorKind::Json {
                        endpoint: endpoint.to_string(),
                        message: format!("{} record: {}", tag, e),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    #[test]
    fn test_parse_page() {
        let body = r#"{"ServiceResponse": {
            "responseCode": "SUCCESS",
            "count": 2,
            "hasMoreRecords": "true",
            "lastId": "17",
            "data": [{"Item": {"id": 16}}, {"Item": {"id": 17}}, {"Other": {"id": 1}}]
        }}"#;
        let page = ServiceResponse::parse("/search", body).unwrap();

        assert!(page.is_success());
        assert!(*page.has_more_records());
        assert_eq!(*page.last_id(), Some(17));
        let items: Vec<Item> = page.records("/search", "Item").unwrap();
        assert_eq!(items, vec![Item { id: 16 }, Item { id: 17 }]);
    }

    #[test]
    fn test_error_response() {
        let body = r#"{"ServiceResponse": {
            "responseCode": "INVALID_REQUEST",
            "responseErrorDetails": {"errorMessage": "Invalid field name"}
        }}"#;
        let page = ServiceResponse::parse("/search", body).unwrap();

        assert!(!page.is_success());
        assert_eq!(page.error_message(), "Invalid field name");
        assert!(page.data().is_empty());
    }

    #[test]
    fn test_missing_envelope_is_parse_error() {
        let err = ServiceResponse::parse("/search", r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Json { .. }));
    }

    #[test]
    fn test_bad_record_names_tag() {
        let body = r#"{"ServiceResponse": {"responseCode": "SUCCESS", "data": [{"Item": {"id": "x"}}]}}"#;
        let page = ServiceResponse::parse("/search", body).unwrap();
        let err = page.records::<Item>("/search", "Item").unwrap_err();
        assert!(err.to_string().contains("Item record"));
    }
}
