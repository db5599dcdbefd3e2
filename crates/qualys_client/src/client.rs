//! Qualys API client.

use crate::xml::{self, DetectionPage};
use crate::{
    ClientConfig, HostAsset, HostDetections, Operator, ServiceRequest, ServiceResponse,
    Vulnerability, WebApp, WebAppFinding,
};
use async_stream::try_stream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use qualys_error::{ApiError, ApiErrorKind, ConfigError, HttpError, HttpErrorKind, QualysResult};
use qualys_rate_limit::{RateLimitState, RateLimiter, RequestExecutor};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, info, instrument};

const PORTAL_VERSION: &str = "/qps/rest/portal/version";
const WEB_APP_SEARCH: &str = "/qps/rest/3.0/search/was/webapp";
const FINDING_SEARCH: &str = "/qps/rest/3.0/search/was/finding";
const HOST_ASSET_SEARCH: &str = "/qps/rest/2.0/search/am/hostasset";
const HOST_DETECTIONS: &str = "/api/2.0/fo/asset/host/vm/detection/";
const KNOWLEDGE_BASE: &str = "/api/2.0/fo/knowledge_base/vuln/";

const REQUESTED_WITH: &str = "qualys-connector";
const JSON: &str = "application/json";
const XML: &str = "text/xml";

/// Web app ids per finding search filter.
const FINDING_WEB_APP_BATCH: usize = 100;

/// Client for one Qualys subscription.
///
/// Every call goes through a shared [`RequestExecutor`], so clones of a
/// client share one rate limit budget and concurrency cap.
#[derive(Debug, Clone)]
pub struct QualysClient {
    http: Client,
    base_url: String,
    executor: RequestExecutor,
    config: ClientConfig,
}

impl QualysClient {
    /// Creates a client with its own rate limiter.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ClientConfig) -> QualysResult<Self> {
        config.rate_limit().validate()?;
        let executor = RequestExecutor::new(RateLimiter::new(*config.rate_limit()));
        Self::with_executor(config, executor)
    }

    /// Creates a client that routes calls through an existing executor.
    pub fn with_executor(config: ClientConfig, executor: RequestExecutor) -> QualysResult<Self> {
        let credentials = STANDARD.encode(format!("{}:{}", config.username(), config.password()));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|e| ConfigError::invalid("username", format!("not usable in a header: {}", e)))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert("x-requested-with", HeaderValue::from_static(REQUESTED_WITH));

        let http = Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| HttpError::new(HttpErrorKind::ClientBuild(e.to_string())))?;

        let base_url = config.api_url().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "Creating Qualys client");

        Ok(Self {
            http,
            base_url,
            executor,
            config,
        })
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executor shared by every call.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Current rate limit state.
    pub async fn rate_limit_state(&self) -> QualysResult<RateLimitState> {
        Ok(self.executor.limiter().snapshot().await?)
    }

    /// Check that the credentials are accepted.
    #[instrument(skip(self))]
    pub async fn verify_authentication(&self) -> QualysResult<()> {
        let url = self.url(PORTAL_VERSION);
        let executed = self
            .executor
            .execute(PORTAL_VERSION, || self.http.get(&url).header(ACCEPT, JSON).send())
            .await?;
        info!(
            attempts = executed.attempts,
            limit_remaining = executed.rate_limit_state.limit_remaining,
            "Qualys credentials verified"
        );
        Ok(())
    }

    /// All web applications, paged by offset.
    pub fn web_apps(&self) -> impl Stream<Item = QualysResult<WebApp>> + '_ {
        try_stream! {
            let page_size = *self.config.page_size();
            let mut offset = 1u64;
            loop {
                let request = ServiceRequest::new()
                    .limit_results(page_size)
                    .start_from_offset(offset);
                let page = self.search(WEB_APP_SEARCH, &request).await?;
                let apps: Vec<WebApp> = page.records(WEB_APP_SEARCH, "WebApp")?;
                let fetched = apps.len() as u64;
                debug!(offset, fetched, "Fetched web app page");

                for app in apps {
                    yield app;
                }
                if !*page.has_more_records() || fetched == 0 {
                    break;
                }
                offset += fetched;
            }
        }
    }

    /// Findings for the given web apps detected after `since`.
    pub fn web_app_findings(
        &self,
        web_app_ids: Vec<u64>,
        since: DateTime<Utc>,
    ) -> impl Stream<Item = QualysResult<WebAppFinding>> + '_ {
        try_stream! {
            let page_size = *self.config.page_size();
            for batch in web_app_ids.chunks(FINDING_WEB_APP_BATCH) {
                let mut offset = 1u64;
                loop {
                    let request = ServiceRequest::new()
                        .criteria("webApp.id", Operator::In, join_ids(batch))
                        .criteria("lastDetectedDate", Operator::Greater, format_since(since))
                        .limit_results(page_size)
                        .start_from_offset(offset);
                    let page = self.search(FINDING_SEARCH, &request).await?;
                    let findings: Vec<WebAppFinding> = page.records(FINDING_SEARCH, "Finding")?;
                    let fetched = findings.len() as u64;
                    debug!(offset, fetched, web_apps = batch.len(), "Fetched finding page");

                    for finding in findings {
                        yield finding;
                    }
                    if !*page.has_more_records() || fetched == 0 {
                        break;
                    }
                    offset += fetched;
                }
            }
        }
    }

    /// Host assets scanned after `since`, paged by id.
    pub fn host_assets(
        &self,
        since: DateTime<Utc>,
    ) -> impl Stream<Item = QualysResult<HostAsset>> + '_ {
        try_stream! {
            let page_size = *self.config.page_size();
            let mut start_id: Option<u64> = None;
            loop {
                let mut request = ServiceRequest::new()
                    .criteria("lastVulnScan", Operator::Greater, format_since(since))
                    .limit_results(page_size);
                if let Some(id) = start_id {
                    request = request.start_from_id(id);
                }
                let page = self.search(HOST_ASSET_SEARCH, &request).await?;
                let hosts: Vec<HostAsset> = page.records(HOST_ASSET_SEARCH, "HostAsset")?;
                let last_id = (*page.last_id())
                    .or_else(|| hosts.iter().map(|host| *host.id()).max());
                debug!(?start_id, fetched = hosts.len(), ?last_id, "Fetched host asset page");

                let fetched = hosts.len();
                for host in hosts {
                    yield host;
                }
                match last_id {
                    Some(last) if *page.has_more_records() && fetched > 0 => {
                        start_id = Some(last + 1);
                    }
                    _ => break,
                }
            }
        }
    }

    /// VM detections for the given host ids, following truncation warnings.
    pub fn host_detections(
        &self,
        host_ids: Vec<u64>,
    ) -> impl Stream<Item = QualysResult<HostDetections>> + '_ {
        try_stream! {
            let batch_size = (*self.config.detection_batch_size()).max(1);
            for batch in host_ids.chunks(batch_size) {
                let mut url = self.url(HOST_DETECTIONS);
                let mut query = vec![
                    ("action", "list".to_string()),
                    ("ids", join_ids(batch)),
                    ("show_results", "1".to_string()),
                    ("truncation_limit", batch.len().to_string()),
                ];
                loop {
                    let body = self.get_text(HOST_DETECTIONS, &url, &query).await?;
                    let DetectionPage { hosts, next_url } =
                        xml::parse_detections(HOST_DETECTIONS, &body)?;
                    debug!(hosts = hosts.len(), truncated = next_url.is_some(), "Fetched detection page");

                    for host in hosts {
                        yield host;
                    }
                    match next_url {
                        Some(next) => {
                            // The continuation URL carries its own query.
                            url = next;
                            query.clear();
                        }
                        None => break,
                    }
                }
            }
        }
    }

    /// Knowledge base entries for the given QIDs.
    pub fn vulnerabilities(
        &self,
        qids: Vec<u64>,
    ) -> impl Stream<Item = QualysResult<Vulnerability>> + '_ {
        try_stream! {
            let batch_size = (*self.config.vulnerability_batch_size()).max(1);
            let url = self.url(KNOWLEDGE_BASE);
            for batch in qids.chunks(batch_size) {
                let query = vec![
                    ("action", "list".to_string()),
                    ("ids", join_ids(batch)),
                    ("details", "All".to_string()),
                ];
                let body = self.get_text(KNOWLEDGE_BASE, &url, &query).await?;
                let vulns = xml::parse_vulnerabilities(KNOWLEDGE_BASE, &body)?;
                debug!(requested = batch.len(), received = vulns.len(), "Fetched knowledge base batch");

                for vuln in vulns {
                    yield vuln;
                }
            }
        }
    }

    #[instrument(skip(self, request))]
    async fn search(&self, endpoint: &str, request: &ServiceRequest) -> QualysResult<ServiceResponse> {
        let url = self.url(endpoint);
        let body = request.to_xml();
        let executed = self
            .executor
            .execute(endpoint, || {
                self.http
                    .post(&url)
                    .header(CONTENT_TYPE, XML)
                    .header(ACCEPT, JSON)
                    .body(body.clone())
                    .send()
            })
            .await?;

        let text = read_body(endpoint, executed.response).await?;
        let page = ServiceResponse::parse(endpoint, &text)?;
        if !page.is_success() {
            return Err(ApiError::new(ApiErrorKind::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                message: page.error_message(),
            })
            .into());
        }
        Ok(page)
    }

    #[instrument(skip(self, query))]
    async fn get_text(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> QualysResult<String> {
        let executed = self
            .executor
            .execute(endpoint, || self.http.get(url).query(query).send())
            .await?;
        read_body(endpoint, executed.response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn read_body(endpoint: &str, response: Response) -> QualysResult<String> {
    Ok(response
        .text()
        .await
        .map_err(|e| {
            HttpError::new(HttpErrorKind::Body {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
        })?)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn format_since(since: DateTime<Utc>) -> String {
    since.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[1, 22, 333]), "1,22,333");
        assert_eq!(join_ids(&[]), "");
    }

    #[test]
    fn test_format_since() {
        let since = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(format_since(since), "2024-03-09T07:05:00Z");
    }
}
