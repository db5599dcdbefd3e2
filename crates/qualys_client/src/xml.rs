//! Decoding of `/api/2.0/fo` XML documents.

use crate::{HostDetections, Vulnerability};
use qualys_error::{ApiError, ApiErrorKind, ParseError, ParseErrorKind, QualysResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// A page of detections and, when truncated, the URL of the next page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DetectionPage {
    pub(crate) hosts: Vec<HostDetections>,
    pub(crate) next_url: Option<String>,
}

#[derive(Deserialize)]
struct DetectionOutput {
    #[serde(rename = "RESPONSE")]
    response: DetectionResponse,
}

#[derive(Deserialize)]
struct DetectionResponse {
    #[serde(rename = "HOST_LIST", default, deserialize_with = "host_list")]
    hosts: Vec<HostDetections>,
    #[serde(rename = "WARNING", default)]
    warning: Option<Warning>,
}

#[derive(Deserialize)]
struct Warning {
    #[serde(rename = "CODE", default)]
    code: Option<String>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct VulnOutput {
    #[serde(rename = "RESPONSE")]
    response: VulnResponse,
}

#[derive(Deserialize)]
struct VulnResponse {
    #[serde(rename = "VULN_LIST", default, deserialize_with = "vuln_list")]
    vulns: Vec<Vulnerability>,
}

#[derive(Deserialize)]
struct SimpleReturn {
    #[serde(rename = "RESPONSE")]
    response: SimpleResponse,
}

#[derive(Deserialize)]
struct SimpleResponse {
    #[serde(rename = "CODE", default)]
    code: Option<String>,
    #[serde(rename = "TEXT", default)]
    text: Option<String>,
}

fn host_list<'de, D>(deserializer: D) -> Result<Vec<HostDetections>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct List {
        #[serde(rename = "HOST", default)]
        items: Vec<HostDetections>,
    }
    Ok(List::deserialize(deserializer)?.items)
}

fn vuln_list<'de, D>(deserializer: D) -> Result<Vec<Vulnerability>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct List {
        #[serde(rename = "VULN", default)]
        items: Vec<Vulnerability>,
    }
    Ok(List::deserialize(deserializer)?.items)
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ParseError> {
    quick_xml::de::from_str(body).map_err(|e| {
        ParseError::new(ParseErrorKind::Xml {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    })
}

/// The fo API reports errors as a 200 response carrying `<SIMPLE_RETURN>`.
fn reject_simple_return(endpoint: &str, body: &str) -> QualysResult<()> {
    if !body.contains("<SIMPLE_RETURN") {
        return Ok(());
    }
    let simple: SimpleReturn = decode(endpoint, body)?;
    let message = match (simple.response.code, simple.response.text) {
        (Some(code), Some(text)) => format!("{}: {}", code, text.trim()),
        (None, Some(text)) => text.trim().to_string(),
        (Some(code), None) => code,
        (None, None) => "unspecified error".to_string(),
    };
    Err(ApiError::new(ApiErrorKind::UnexpectedResponse {
        endpoint: endpoint.to_string(),
        message,
    })
    .into())
}

/// Decode a `HOST_LIST_VM_DETECTION_OUTPUT` document.
pub(crate) fn parse_detections(endpoint: &str, body: &str) -> QualysResult<DetectionPage> {
    reject_simple_return(endpoint, body)?;
    let output: DetectionOutput = decode(endpoint, body)?;
    let next_url = output.response.warning.and_then(|warning| {
        debug!(code = ?warning.code, "Detection list truncated");
        warning.url.map(|url| url.trim().to_string())
    });
    Ok(DetectionPage {
        hosts: output.response.hosts,
        next_url,
    })
}

/// Decode a `KNOWLEDGE_BASE_VULN_LIST_OUTPUT` document.
pub(crate) fn parse_vulnerabilities(endpoint: &str, body: &str) -> QualysResult<Vec<Vulnerability>> {
    reject_simple_return(endpoint, body)?;
    let output: VulnOutput = decode(endpoint, body)?;
    Ok(output.response.vulns)
}
