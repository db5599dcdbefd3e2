//! Integration tests for the Qualys client against a mock server.

use chrono::{TimeZone, Utc};
use futures_util::TryStreamExt;
use qualys_client::{ClientConfig, QualysClient};
use qualys_error::{ApiErrorKind, QualysErrorKind};
use qualys_rate_limit::RateLimitConfig;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEB_APP_SEARCH: &str = "/qps/rest/3.0/search/was/webapp";
const FINDING_SEARCH: &str = "/qps/rest/3.0/search/was/finding";
const HOST_ASSET_SEARCH: &str = "/qps/rest/2.0/search/am/hostasset";
const HOST_DETECTIONS: &str = "/api/2.0/fo/asset/host/vm/detection/";
const KNOWLEDGE_BASE: &str = "/api/2.0/fo/knowledge_base/vuln/";

fn config_builder(server: &MockServer) -> qualys_client::ClientConfigBuilder {
    let mut builder = ClientConfig::builder();
    builder
        .api_url(server.uri())
        .username("user")
        .password("pass")
        .rate_limit(RateLimitConfig {
            cooldown_period: 10,
            ..Default::default()
        });
    builder
}

fn create_client(server: &MockServer) -> QualysClient {
    QualysClient::new(config_builder(server).build().unwrap()).unwrap()
}

fn service_page(tag: &str, records: Vec<serde_json::Value>, more: bool) -> serde_json::Value {
    let data: Vec<_> = records.into_iter().map(|record| json!({ tag: record })).collect();
    json!({
        "ServiceResponse": {
            "responseCode": "SUCCESS",
            "count": data.len(),
            "hasMoreRecords": if more { "true" } else { "false" },
            "data": data
        }
    })
}

#[tokio::test]
async fn test_verify_authentication_sends_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/qps/rest/portal/version"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("x-requested-with", "qualys-connector"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ServiceResponse": {"responseCode": "SUCCESS", "data": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    create_client(&server).verify_authentication().await.unwrap();
}

#[tokio::test]
async fn test_verify_authentication_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/qps/rest/portal/version"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = create_client(&server).verify_authentication().await.unwrap_err();
    assert!(matches!(
        err.as_api().map(|e| e.kind()),
        Some(ApiErrorKind::Authentication { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_web_apps_follow_offset_paging() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(WEB_APP_SEARCH))
        .and(body_string_contains("<startFromOffset>1</startFromOffset>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service_page(
            "WebApp",
            vec![
                json!({"id": 1, "name": "Storefront", "url": "https://shop.example.com"}),
                json!({"id": 2, "name": "Admin"}),
            ],
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(WEB_APP_SEARCH))
        .and(body_string_contains("<startFromOffset>3</startFromOffset>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service_page(
            "WebApp",
            vec![json!({"id": 3, "name": "Blog"})],
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let apps: Vec<_> = client.web_apps().try_collect().await.unwrap();

    let ids: Vec<u64> = apps.iter().map(|app| *app.id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(apps[0].url().as_deref(), Some("https://shop.example.com"));
}

#[tokio::test]
async fn test_findings_filtered_by_web_app_and_date() {
    let server = MockServer::start().await;
    let since = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

    Mock::given(method("POST"))
        .and(path(FINDING_SEARCH))
        .and(body_string_contains(r#"<Criteria field="webApp.id" operator="IN">10,11</Criteria>"#))
        .and(body_string_contains(
            r#"<Criteria field="lastDetectedDate" operator="GREATER">2024-01-15T00:00:00Z</Criteria>"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(service_page(
            "Finding",
            vec![json!({
                "id": 500, "qid": 150001, "name": "Reflected XSS",
                "severity": 5, "webApp": {"id": 10}
            })],
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let findings: Vec<_> = client
        .web_app_findings(vec![10, 11], since)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(findings.len(), 1);
    assert_eq!(*findings[0].qid(), 150001);
    assert_eq!(*findings[0].web_app().id(), 10);
}

#[tokio::test]
async fn test_host_assets_follow_id_paging() {
    let server = MockServer::start().await;
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut first = service_page(
        "HostAsset",
        vec![json!({"id": 7, "qwebHostId": 101}), json!({"id": 9, "qwebHostId": 102})],
        true,
    );
    first["ServiceResponse"]["lastId"] = json!(9);

    Mock::given(method("POST"))
        .and(path(HOST_ASSET_SEARCH))
        .and(body_string_contains("lastVulnScan"))
        .and(body_string_contains("<startFromId>10</startFromId>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service_page(
            "HostAsset",
            vec![json!({"id": 12, "qwebHostId": 103})],
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(HOST_ASSET_SEARCH))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let hosts: Vec<_> = client.host_assets(since).try_collect().await.unwrap();

    let vm_ids: Vec<Option<u64>> = hosts.iter().map(|host| *host.qweb_host_id()).collect();
    assert_eq!(vm_ids, vec![Some(101), Some(102), Some(103)]);
}

#[tokio::test]
async fn test_search_failure_code_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(WEB_APP_SEARCH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ServiceResponse": {
                "responseCode": "INVALID_REQUEST",
                "responseErrorDetails": {"errorMessage": "Unknown criteria field"}
            }
        })))
        .mount(&server)
        .await;

    let client = create_client(&server);
    let err = client.web_apps().try_collect::<Vec<_>>().await.unwrap_err();
    match err.as_api().map(|e| e.kind()) {
        Some(ApiErrorKind::UnexpectedResponse { message, .. }) => {
            assert_eq!(message, "Unknown criteria field");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_detections_follow_truncation_url() {
    let server = MockServer::start().await;

    let first_page = format!(
        r#"<HOST_LIST_VM_DETECTION_OUTPUT><RESPONSE>
<HOST_LIST><HOST><ID>101</ID><DETECTION_LIST>
<DETECTION><QID>38170</QID><TYPE>Confirmed</TYPE><SEVERITY>3</SEVERITY></DETECTION>
</DETECTION_LIST></HOST></HOST_LIST>
<WARNING><CODE>1980</CODE><URL><![CDATA[{}{}?action=list&ids=101,102&id_min=102]]></URL></WARNING>
</RESPONSE></HOST_LIST_VM_DETECTION_OUTPUT>"#,
        server.uri(),
        HOST_DETECTIONS
    );
    let second_page = r#"<HOST_LIST_VM_DETECTION_OUTPUT><RESPONSE>
<HOST_LIST><HOST><ID>102</ID></HOST></HOST_LIST>
</RESPONSE></HOST_LIST_VM_DETECTION_OUTPUT>"#;

    Mock::given(method("GET"))
        .and(path(HOST_DETECTIONS))
        .and(query_param("action", "list"))
        .and(query_param("ids", "101,102"))
        .and(query_param_is_missing("id_min"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first_page))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(HOST_DETECTIONS))
        .and(query_param("id_min", "102"))
        .respond_with(ResponseTemplate::new(200).set_body_string(second_page))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let hosts: Vec<_> = client
        .host_detections(vec![101, 102])
        .try_collect()
        .await
        .unwrap();

    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0].detections().len(), 1);
    assert_eq!(*hosts[1].id(), 102);
}

#[tokio::test]
async fn test_vulnerabilities_requested_in_batches() {
    let server = MockServer::start().await;

    let kb = |qid: u64| {
        format!(
            "<KNOWLEDGE_BASE_VULN_LIST_OUTPUT><RESPONSE><VULN_LIST>\
             <VULN><QID>{}</QID><TITLE>Vuln {}</TITLE></VULN>\
             </VULN_LIST></RESPONSE></KNOWLEDGE_BASE_VULN_LIST_OUTPUT>",
            qid, qid
        )
    };

    Mock::given(method("GET"))
        .and(path(KNOWLEDGE_BASE))
        .and(query_param("ids", "1,2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(kb(1)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(KNOWLEDGE_BASE))
        .and(query_param("ids", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(kb(3)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_builder(&server)
        .vulnerability_batch_size(2usize)
        .build()
        .unwrap();
    let client = QualysClient::new(config).unwrap();
    let vulns: Vec<_> = client
        .vulnerabilities(vec![1, 2, 3])
        .try_collect()
        .await
        .unwrap();

    let qids: Vec<u64> = vulns.iter().map(|vuln| *vuln.qid()).collect();
    assert_eq!(qids, vec![1, 3]);
}

#[tokio::test]
async fn test_empty_id_lists_issue_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let hosts: Vec<_> = client.host_detections(Vec::new()).try_collect().await.unwrap();
    let vulns: Vec<_> = client.vulnerabilities(Vec::new()).try_collect().await.unwrap();
    assert!(hosts.is_empty());
    assert!(vulns.is_empty());
}

#[tokio::test]
async fn test_throttled_search_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(WEB_APP_SEARCH))
        .respond_with(
            ResponseTemplate::new(409)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-concurrency-limit-running", "2"),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(WEB_APP_SEARCH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "250")
                .set_body_json(service_page("WebApp", vec![json!({"id": 1, "name": "App"})], false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let apps: Vec<_> = client.web_apps().try_collect().await.unwrap();

    assert_eq!(apps.len(), 1);
    let state = client.rate_limit_state().await.unwrap();
    assert_eq!(state.limit_remaining, 250);
    assert_eq!(state.concurrency_running, 0);
}

#[tokio::test]
async fn test_throttle_exhaustion_surfaces_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/qps/rest/portal/version"))
        .respond_with(ResponseTemplate::new(409))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_builder(&server)
        .rate_limit(RateLimitConfig {
            cooldown_period: 10,
            max_attempts: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let err = QualysClient::new(config)
        .unwrap()
        .verify_authentication()
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), QualysErrorKind::Api(_)));
    assert!(matches!(
        err.as_api().map(|e| e.kind()),
        Some(ApiErrorKind::RetriesExhausted { status: 409, attempts: 2, .. })
    ));
}
