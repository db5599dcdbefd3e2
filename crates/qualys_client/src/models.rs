//! Records returned by the Qualys APIs.
//!
//! QPS REST records (`WebApp`, `Finding`, `HostAsset`) are JSON with camelCase
//! keys. The `/api/2.0/fo` records (detections, knowledge base) are XML with
//! upper-case element names.

use crate::lenient;
use derive_getters::Getters;
use serde::{Deserialize, Deserializer, Serialize};

/// Web application registered in Web Application Scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct WebApp {
    /// Qualys id
    id: u64,
    /// Display name
    name: String,
    /// Root URL
    #[serde(default)]
    url: Option<String>,
    /// Creation timestamp
    #[serde(default)]
    created_date: Option<String>,
    /// Last update timestamp
    #[serde(default)]
    updated_date: Option<String>,
}

/// Web app reference embedded in a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct FindingWebApp {
    /// Qualys id of the web app
    id: u64,
    /// Web app name
    #[serde(default)]
    name: Option<String>,
    /// Web app URL
    #[serde(default)]
    url: Option<String>,
}

/// A WAS finding (vulnerability, sensitive content or information gathered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct WebAppFinding {
    /// Qualys id
    id: u64,
    /// Stable id across rescans
    #[serde(default)]
    unique_id: Option<String>,
    /// Knowledge base id
    qid: u64,
    /// Title
    name: String,
    /// `VULNERABILITY`, `SENSITIVE_CONTENT` or `INFORMATION_GATHERED`
    #[serde(rename = "type", default)]
    finding_type: Option<String>,
    /// Severity 1 to 5
    #[serde(default, deserialize_with = "lenient::opt_u8")]
    severity: Option<u8>,
    /// `NEW`, `ACTIVE`, `REOPENED`, `FIXED`
    #[serde(default)]
    status: Option<String>,
    /// Affected URL
    #[serde(default)]
    url: Option<String>,
    /// Owning web app
    web_app: FindingWebApp,
    /// First detection timestamp
    #[serde(default)]
    first_detected_date: Option<String>,
    /// Last detection timestamp
    #[serde(default)]
    last_detected_date: Option<String>,
}

/// Host from Asset Management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct HostAsset {
    /// Asset id
    id: u64,
    /// Asset name
    #[serde(default)]
    name: Option<String>,
    /// DNS host name
    #[serde(default)]
    dns_host_name: Option<String>,
    /// Fully qualified domain name
    #[serde(default)]
    fqdn: Option<String>,
    /// Primary IP address
    #[serde(default)]
    address: Option<String>,
    /// Operating system
    #[serde(default)]
    os: Option<String>,
    /// `IP`, `DNS`, `NETBIOS`, `AGENT`...
    #[serde(default)]
    tracking_method: Option<String>,
    /// Host id in Vulnerability Management, used by the detection API
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    qweb_host_id: Option<u64>,
    /// Last vulnerability scan timestamp
    #[serde(default)]
    last_vuln_scan: Option<String>,
    /// Creation timestamp
    #[serde(default)]
    created: Option<String>,
    /// Last modification timestamp
    #[serde(default)]
    modified: Option<String>,
}

/// A host and its VM detections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HostDetections {
    /// VM host id
    id: u64,
    /// IP address
    #[serde(default)]
    ip: Option<String>,
    /// DNS name
    #[serde(default)]
    dns: Option<String>,
    /// Operating system
    #[serde(default)]
    os: Option<String>,
    /// Tracking method
    #[serde(default)]
    tracking_method: Option<String>,
    /// Last scan timestamp
    #[serde(default)]
    last_scan_datetime: Option<String>,
    /// Detections on this host
    #[serde(rename = "DETECTION_LIST", default, deserialize_with = "detection_list")]
    detections: Vec<Detection>,
}

/// One vulnerability detected on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Detection {
    /// Knowledge base id
    qid: u64,
    /// `Confirmed`, `Potential` or `Info`
    #[serde(rename = "TYPE")]
    detection_type: String,
    /// Severity 1 to 5
    #[serde(default)]
    severity: Option<u8>,
    /// Port
    #[serde(default)]
    port: Option<u32>,
    /// Protocol
    #[serde(default)]
    protocol: Option<String>,
    /// `New`, `Active`, `Fixed`, `Re-Opened`
    #[serde(default)]
    status: Option<String>,
    /// Scan output
    #[serde(default)]
    results: Option<String>,
    /// First found timestamp
    #[serde(default)]
    first_found_datetime: Option<String>,
    /// Last found timestamp
    #[serde(default)]
    last_found_datetime: Option<String>,
    /// 1 when the detection is disabled
    #[serde(default)]
    is_disabled: Option<u8>,
}

/// Knowledge base entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Vulnerability {
    /// Knowledge base id
    qid: u64,
    /// `Vulnerability`, `Potential Vulnerability`, `Information Gathered`
    #[serde(default)]
    vuln_type: Option<String>,
    /// Severity 1 to 5
    #[serde(default)]
    severity_level: Option<u8>,
    /// Title
    title: String,
    /// Category
    #[serde(default)]
    category: Option<String>,
    /// Publication timestamp
    #[serde(default)]
    published_datetime: Option<String>,
    /// 1 when a patch exists
    #[serde(default)]
    patchable: Option<u8>,
    /// Diagnosis text
    #[serde(default)]
    diagnosis: Option<String>,
    /// Consequence text
    #[serde(default)]
    consequence: Option<String>,
    /// Solution text
    #[serde(default)]
    solution: Option<String>,
    /// Referenced CVEs
    #[serde(rename = "CVE_LIST", default, deserialize_with = "cve_list")]
    cves: Vec<Cve>,
    /// CVSS v2 scores
    #[serde(default)]
    cvss: Option<Cvss>,
    /// CVSS v3 scores
    #[serde(default)]
    cvss_v3: Option<Cvss>,
}

impl Vulnerability {
    /// True when the knowledge base lists a patch.
    pub fn is_patchable(&self) -> bool {
        self.patchable == Some(1)
    }

    /// CVSS v3 base score, falling back to v2.
    pub fn cvss_base_score(&self) -> Option<f32> {
        self.cvss_v3
            .as_ref()
            .and_then(Cvss::base_score)
            .or_else(|| self.cvss.as_ref().and_then(Cvss::base_score))
    }
}

/// CVE reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Cve {
    /// CVE id
    id: String,
    /// Reference URL
    #[serde(default)]
    url: Option<String>,
}

/// CVSS score block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Cvss {
    #[serde(default)]
    base: Option<ScoreText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScoreText {
    // BASE may carry a `source` attribute, so the score sits in the text node.
    #[serde(rename = "$text", default)]
    value: String,
}

impl Cvss {
    /// Base score when present and numeric.
    pub fn base_score(&self) -> Option<f32> {
        self.base.as_ref()?.value.trim().parse().ok()
    }
}

fn detection_list<'de, D>(deserializer: D) -> Result<Vec<Detection>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct List {
        #[serde(rename = "DETECTION", default)]
        items: Vec<Detection>,
    }
    Ok(List::deserialize(deserializer)?.items)
}

fn cve_list<'de, D>(deserializer: D) -> Result<Vec<Cve>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct List {
        #[serde(rename = "CVE", default)]
        items: Vec<Cve>,
    }
    Ok(List::deserialize(deserializer)?.items)
}
