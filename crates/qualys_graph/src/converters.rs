//! Conversion of Qualys records into graph entities.

use crate::Entity;
use chrono::{DateTime, NaiveDateTime};
use qualys_client::{Detection, HostAsset, HostDetections, Vulnerability, WebApp, WebAppFinding};
use serde_json::Value;

/// Entity type of the account.
pub const ACCOUNT_TYPE: &str = "qualys_account";
/// Entity type of the scanning services.
pub const SERVICE_TYPE: &str = "qualys_service";
/// Entity type of web applications.
pub const WEB_APP_TYPE: &str = "qualys_web_app";
/// Entity type of web application findings.
pub const WEB_APP_FINDING_TYPE: &str = "qualys_web_app_finding";
/// Entity type of hosts.
pub const HOST_TYPE: &str = "qualys_host";
/// Entity type of host findings.
pub const HOST_FINDING_TYPE: &str = "qualys_host_finding";
/// Entity type of knowledge base vulnerabilities.
pub const VULN_TYPE: &str = "qualys_vuln";

/// Qualys products represented as service entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ServiceKind {
    /// Vulnerability Management
    #[strum(serialize = "vm")]
    VulnerabilityManagement,
    /// Web Application Scanning
    #[strum(serialize = "was")]
    WebApplicationScanning,
}

impl ServiceKind {
    /// Product name shown to users.
    pub fn display_name(self) -> &'static str {
        match self {
            ServiceKind::VulnerabilityManagement => "Qualys Vulnerability Management",
            ServiceKind::WebApplicationScanning => "Qualys Web Application Scanning",
        }
    }

    fn category(self) -> &'static str {
        match self {
            ServiceKind::VulnerabilityManagement => "network",
            ServiceKind::WebApplicationScanning => "application",
        }
    }
}

/// Map a Qualys 1-5 severity onto the normalized scale.
pub fn normalize_severity(severity: u8) -> &'static str {
    match severity {
        0 | 1 => "informational",
        2 => "low",
        3 => "medium",
        4 => "high",
        _ => "critical",
    }
}

/// Epoch milliseconds for a Qualys timestamp.
///
/// Accepts RFC 3339 and the zone-less `YYYY-MM-DDTHH:MM:SS` form, read as UTC.
pub fn parse_timestamp(value: Option<&str>) -> Option<i64> {
    let value = value?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|parsed| parsed.and_utc().timestamp_millis())
}

/// Host part of an API URL, used to scope account keys.
fn api_host(api_url: &str) -> &str {
    let without_scheme = api_url.split_once("://").map_or(api_url, |(_, rest)| rest);
    without_scheme.split(['/', ':']).next().unwrap_or(without_scheme)
}

/// Key of the account entity for an API URL.
pub fn account_key(api_url: &str) -> String {
    format!("{}:{}", ACCOUNT_TYPE, api_host(api_url))
}

/// The subscription account.
pub fn create_account_entity(api_url: &str, username: &str) -> Entity {
    Entity::new(account_key(api_url), ACCOUNT_TYPE, &["Account"], "Qualys")
        .with_property("name", "Qualys")
        .with_property("apiUrl", api_url)
        .with_property("username", username)
}

/// Key of a service entity.
pub fn service_key(account_key: &str, kind: ServiceKind) -> String {
    format!("{}:{}:{}", SERVICE_TYPE, account_key, kind)
}

/// One Qualys product under the account.
pub fn create_service_entity(account_key: &str, kind: ServiceKind) -> Entity {
    Entity::new(
        service_key(account_key, kind),
        SERVICE_TYPE,
        &["Service"],
        kind.display_name(),
    )
    .with_property("name", kind.display_name())
    .with_property("category", vec![kind.category()])
    .with_property("function", vec!["scanning"])
}

/// Key of a web app entity.
pub fn web_app_key(id: u64) -> String {
    format!("{}:{}", WEB_APP_TYPE, id)
}

/// A scanned web application.
pub fn create_web_app_entity(web_app: &WebApp) -> Entity {
    Entity::new(web_app_key(*web_app.id()), WEB_APP_TYPE, &["Application"], web_app.name())
        .with_property("id", web_app.id().to_string())
        .with_property("name", web_app.name().as_str())
        .with_property("url", web_app.url().clone())
        .with_property("createdOn", parse_timestamp(web_app.created_date().as_deref()))
        .with_property("updatedOn", parse_timestamp(web_app.updated_date().as_deref()))
}

/// A finding reported by Web Application Scanning.
pub fn create_web_app_finding_entity(finding: &WebAppFinding) -> Entity {
    let status = finding.status().clone();
    let open = status.as_deref().map(|status| status != "FIXED");
    let severity = finding.severity().map(normalize_severity);

    Entity::new(
        format!("{}:{}", WEB_APP_FINDING_TYPE, finding.id()),
        WEB_APP_FINDING_TYPE,
        &["Finding"],
        finding.name(),
    )
    .with_property("id", finding.id().to_string())
    .with_property("name", finding.name().as_str())
    .with_property("qid", *finding.qid())
    .with_property("uniqueId", finding.unique_id().clone())
    .with_property("type", finding.finding_type().clone())
    .with_property("numericSeverity", *finding.severity())
    .with_property("severity", severity)
    .with_property("status", status)
    .with_property("open", open)
    .with_property("targets", finding.url().clone().map(|url| vec![url]))
    .with_property("webAppId", *finding.web_app().id())
    .with_property("firstSeenOn", parse_timestamp(finding.first_detected_date().as_deref()))
    .with_property("lastSeenOn", parse_timestamp(finding.last_detected_date().as_deref()))
}

/// Key of a host entity.
pub fn host_key(id: u64) -> String {
    format!("{}:{}", HOST_TYPE, id)
}

/// A host from Asset Management.
pub fn create_host_entity(host: &HostAsset) -> Entity {
    let display_name = host
        .name()
        .clone()
        .or_else(|| host.fqdn().clone())
        .or_else(|| host.dns_host_name().clone())
        .or_else(|| host.address().clone())
        .unwrap_or_else(|| host.id().to_string());

    Entity::new(host_key(*host.id()), HOST_TYPE, &["Host"], display_name)
        .with_property("id", host.id().to_string())
        .with_property("hostname", host.dns_host_name().clone())
        .with_property("fqdn", host.fqdn().clone())
        .with_property("ipAddress", host.address().clone())
        .with_property("os", host.os().clone())
        .with_property("trackingMethod", host.tracking_method().clone())
        .with_property("qwebHostId", *host.qweb_host_id())
        .with_property("lastScannedOn", parse_timestamp(host.last_vuln_scan().as_deref()))
        .with_property("createdOn", parse_timestamp(host.created().as_deref()))
        .with_property("updatedOn", parse_timestamp(host.modified().as_deref()))
}

/// Key of a host finding. Port and protocol distinguish repeated QIDs.
pub fn host_finding_key(host_id: u64, detection: &Detection) -> String {
    let mut key = format!("{}:{}:{}", HOST_FINDING_TYPE, host_id, detection.qid());
    if let Some(port) = detection.port() {
        key.push_str(&format!(":{}", port));
    }
    if let Some(protocol) = detection.protocol() {
        key.push_str(&format!(":{}", protocol));
    }
    key
}

/// A VM detection on a host.
pub fn create_host_finding_entity(host: &HostDetections, detection: &Detection) -> Entity {
    let status = detection.status().clone();
    let open = status.as_deref().map(|status| status != "Fixed");
    let display_name = format!("QID {}", detection.qid());

    Entity::new(
        host_finding_key(*host.id(), detection),
        HOST_FINDING_TYPE,
        &["Finding"],
        display_name,
    )
    .with_property("qid", *detection.qid())
    .with_property("type", detection.detection_type().as_str())
    .with_property("numericSeverity", *detection.severity())
    .with_property("severity", detection.severity().map(normalize_severity))
    .with_property("status", status)
    .with_property("open", open)
    .with_property("disabled", detection.is_disabled().map(|flag| flag == 1))
    .with_property("port", *detection.port())
    .with_property("protocol", detection.protocol().clone())
    .with_property("hostId", *host.id())
    .with_property("ipAddress", host.ip().clone())
    .with_property("firstSeenOn", parse_timestamp(detection.first_found_datetime().as_deref()))
    .with_property("lastSeenOn", parse_timestamp(detection.last_found_datetime().as_deref()))
}

/// Key of a knowledge base vulnerability.
pub fn vuln_key(qid: u64) -> String {
    format!("{}:{}", VULN_TYPE, qid)
}

/// A knowledge base vulnerability.
pub fn create_vuln_entity(vuln: &Vulnerability) -> Entity {
    let cve_ids: Vec<Value> = vuln
        .cves()
        .iter()
        .map(|cve| Value::from(cve.id().as_str()))
        .collect();

    Entity::new(vuln_key(*vuln.qid()), VULN_TYPE, &["Vulnerability"], vuln.title())
        .with_property("qid", *vuln.qid())
        .with_property("name", vuln.title().as_str())
        .with_property("category", vuln.category().clone())
        .with_property("vulnType", vuln.vuln_type().clone())
        .with_property("numericSeverity", *vuln.severity_level())
        .with_property("severity", vuln.severity_level().map(normalize_severity))
        .with_property("cvssScore", vuln.cvss_base_score())
        .with_property("cveIds", (!cve_ids.is_empty()).then_some(cve_ids))
        .with_property("patchable", vuln.patchable().map(|_| vuln.is_patchable()))
        .with_property("solution", vuln.solution().clone())
        .with_property("publishedOn", parse_timestamp(vuln.published_datetime().as_deref()))
        .with_property(
            "webLink",
            format!(
                "https://qualysguard.qualys.com/fo/tools/kbase/vulnDetails.php?id={}",
                vuln.qid()
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host_detections() -> HostDetections {
        serde_json::from_value(json!({
            "ID": 101,
            "IP": "10.0.0.5",
            "DETECTION_LIST": {"DETECTION": [
                {"QID": 38170, "TYPE": "Confirmed", "SEVERITY": 4, "PORT": 443, "PROTOCOL": "tcp", "STATUS": "Active"},
                {"QID": 38170, "TYPE": "Confirmed", "SEVERITY": 4, "PORT": 8443, "PROTOCOL": "tcp", "STATUS": "Fixed"}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_severity() {
        assert_eq!(normalize_severity(1), "informational");
        assert_eq!(normalize_severity(3), "medium");
        assert_eq!(normalize_severity(5), "critical");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp(Some("1970-01-01T00:00:01Z")), Some(1000));
        assert_eq!(parse_timestamp(Some("1970-01-01T00:00:02")), Some(2000));
        assert_eq!(parse_timestamp(Some("yesterday")), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn test_account_key_uses_host() {
        assert_eq!(
            account_key("https://qualysapi.qg2.apps.qualys.com/"),
            "qualys_account:qualysapi.qg2.apps.qualys.com"
        );
        assert_eq!(account_key("http://127.0.0.1:8080"), "qualys_account:127.0.0.1");
    }

    #[test]
    fn test_service_entities_are_distinct() {
        let account = account_key("https://qualysapi.qualys.com");
        let vm = create_service_entity(&account, ServiceKind::VulnerabilityManagement);
        let was = create_service_entity(&account, ServiceKind::WebApplicationScanning);
        assert_ne!(vm.key(), was.key());
        assert!(vm.key().ends_with(":vm"));
        assert_eq!(was.display_name(), "Qualys Web Application Scanning");
    }

    #[test]
    fn test_host_finding_keys_include_port() {
        let host = host_detections();
        let keys: Vec<String> = host
            .detections()
            .iter()
            .map(|detection| host_finding_key(*host.id(), detection))
            .collect();
        assert_eq!(
            keys,
            vec![
                "qualys_host_finding:101:38170:443:tcp".to_string(),
                "qualys_host_finding:101:38170:8443:tcp".to_string(),
            ]
        );

        let fixed = create_host_finding_entity(&host, &host.detections()[1]);
        assert_eq!(fixed.property("open"), Some(&json!(false)));
        assert_eq!(fixed.property("severity"), Some(&json!("high")));
    }

    #[test]
    fn test_host_display_name_falls_back_to_address() {
        let host: HostAsset = serde_json::from_value(json!({"id": 3, "address": "10.1.1.1"})).unwrap();
        let entity = create_host_entity(&host);
        assert_eq!(entity.display_name(), "10.1.1.1");
        assert_eq!(entity.key(), "qualys_host:3");
        assert!(entity.property("os").is_none());
    }
}
