//! Tests for record sources and the extractor

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig};
use crate::pagination::StopReason;
use crate::resources::FetchStrategy;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resource(name: &str) -> &'static Resource {
    Resource::lookup(name).unwrap()
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
}

/// Source that replays scripted pages and records each request
struct ScriptedSource {
    pages: Mutex<VecDeque<crate::error::Result<Vec<Value>>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    fn new(pages: Vec<crate::error::Result<Vec<Value>>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RecordSource for ScriptedSource {
    fn source_tag(&self) -> &'static str {
        "scripted"
    }

    fn endpoint(&self, resource: &Resource) -> crate::error::Result<String> {
        Ok(resource.name.to_string())
    }

    async fn fetch_page(
        &self,
        _resource: &Resource,
        request: &PageRequest,
    ) -> crate::error::Result<Vec<Value>> {
        self.requests.lock().unwrap().push(*request);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn records(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "id": i })).collect()
}

// ============================================================================
// Normalisation
// ============================================================================

#[test]
fn test_normalize_http_body() {
    assert_eq!(normalize_http_body(json!([{"id": 1}])), vec![json!({"id": 1})]);
    assert_eq!(
        normalize_http_body(json!({"items": [{"id": 1}], "total": 1})),
        vec![json!({"id": 1})]
    );
    assert_eq!(
        normalize_http_body(json!({"data": [{"id": 2}]})),
        vec![json!({"id": 2})]
    );
    assert!(normalize_http_body(json!({"name": "Acme"})).is_empty());
    assert!(normalize_http_body(Value::Null).is_empty());
}

#[test]
fn test_collection_wrapper_without_items_has_no_records() {
    let wrapped = json!({"customers": [{"id": "c1"}], "total": 1});
    assert!(normalize_http_body(wrapped.clone()).is_empty());
    assert!(normalize_http_body(json!({"total": 0})).is_empty());
    assert!(records_from_body(FetchStrategy::Paginated, wrapped).is_empty());
    assert!(records_from_body(FetchStrategy::DateRange, json!({"total": 0})).is_empty());
}

#[test]
fn test_single_route_object_is_one_record() {
    assert_eq!(
        records_from_body(FetchStrategy::Single, json!({"name": "Acme"})),
        vec![json!({"name": "Acme"})]
    );
    assert_eq!(
        records_from_body(FetchStrategy::Single, json!([{"id": 1}, {"id": 2}])).len(),
        2
    );
    assert_eq!(
        records_from_body(FetchStrategy::Single, json!({"data": [{"id": 3}]})),
        vec![json!({"id": 3})]
    );
}

#[tokio::test]
async fn test_http_paged_envelope_without_records() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounting/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "page": 1})))
        .mount(&mock_server)
        .await;

    let source = http_source(mock_server.uri());
    let request = PageRequest {
        page: Some(1),
        page_size: Some(500),
        window: None,
    };

    let page = source
        .fetch_page(resource("transactions"), &request)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_normalize_bridge_data() {
    assert_eq!(
        normalize_bridge_data(json!({"customers": [{"id": "c1"}], "total": 1})),
        vec![json!({"id": "c1"})]
    );
    assert_eq!(
        normalize_bridge_data(json!({"expenses": []})),
        Vec::<Value>::new()
    );
    assert_eq!(
        normalize_bridge_data(json!({"name": "Acme"})),
        vec![json!({"name": "Acme"})]
    );
    assert_eq!(normalize_bridge_data(json!([1, 2])).len(), 2);
    assert!(normalize_bridge_data(Value::Null).is_empty());
}

// ============================================================================
// HTTP source
// ============================================================================

fn http_source(base_url: String) -> HttpSource {
    let config = HttpClientConfig::builder()
        .base_url(base_url)
        .max_retries(0)
        .no_rate_limit()
        .build();
    HttpSource::new(HttpClient::with_config(config).unwrap())
}

#[tokio::test]
async fn test_http_source_sends_paging_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "c1"}, {"id": "c2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = http_source(server.uri());
    let request = PageRequest {
        page: Some(2),
        page_size: Some(500),
        window: None,
    };
    let page = source
        .fetch_page(resource("customers"), &request)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(source.source_tag(), "payday");
}

#[tokio::test]
async fn test_http_source_sends_date_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounting/statement"))
        .and(query_param("dateFrom", "2022-01-01"))
        .and(query_param("dateTo", "2024-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "t1"}])))
        .mount(&server)
        .await;

    let source = http_source(server.uri());
    let request = PageRequest {
        window: Some(crate::resources::DateWindow {
            from: start_date(),
            to: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }),
        ..PageRequest::default()
    };
    let page = source
        .fetch_page(resource("account-statement"), &request)
        .await
        .unwrap();
    assert_eq!(page, vec![json!({"id": "t1"})]);
}

#[tokio::test]
async fn test_http_source_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/company"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let source = http_source(server.uri());
    let err = source
        .fetch_page(resource("company"), &PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 403, .. }));
}

// ============================================================================
// Extractor
// ============================================================================

#[tokio::test]
async fn test_extractor_pages_until_short_page() {
    let source = ScriptedSource::new(vec![Ok(records(2)), Ok(records(2)), Ok(records(1))]);
    let extractor = Extractor::new(&source, 2, 100, start_date());

    let extraction = extractor.fetch_all(resource("invoices")).await.unwrap();

    assert_eq!(extraction.records.len(), 5);
    assert_eq!(extraction.pages_fetched, 3);
    assert_eq!(extraction.stop, StopReason::ShortPage);
    let pages: Vec<_> = source.requests().iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn test_extractor_stops_on_empty_page() {
    let source = ScriptedSource::new(vec![Ok(records(2)), Ok(Vec::new())]);
    let extractor = Extractor::new(&source, 2, 100, start_date());

    let extraction = extractor.fetch_all(resource("payments")).await.unwrap();
    assert_eq!(extraction.records.len(), 2);
    assert_eq!(extraction.pages_fetched, 1);
    assert_eq!(extraction.stop, StopReason::EmptyPage);
}

#[tokio::test]
async fn test_extractor_first_page_failure_is_fatal() {
    let source = ScriptedSource::new(vec![Err(Error::http_status(500, "down"))]);
    let extractor = Extractor::new(&source, 2, 100, start_date());

    let err = extractor.fetch_all(resource("accounts")).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_extractor_later_page_failure_keeps_records() {
    let source = ScriptedSource::new(vec![
        Ok(records(2)),
        Ok(records(2)),
        Err(Error::http_status(502, "bad gateway")),
    ]);
    let extractor = Extractor::new(&source, 2, 100, start_date());

    let extraction = extractor.fetch_all(resource("expenses")).await.unwrap();
    assert_eq!(extraction.records.len(), 4);
    assert_eq!(extraction.pages_fetched, 2);
    assert_eq!(extraction.stop, StopReason::PageFailed);
}

#[tokio::test]
async fn test_extractor_max_pages() {
    let source = ScriptedSource::new(vec![Ok(records(1)), Ok(records(1)), Ok(records(1))]);
    let extractor = Extractor::new(&source, 1, 2, start_date());

    let extraction = extractor.fetch_all(resource("customers")).await.unwrap();
    assert_eq!(extraction.records.len(), 2);
    assert_eq!(extraction.stop, StopReason::MaxPages);
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test]
async fn test_extractor_single_and_date_range() {
    let source = ScriptedSource::new(vec![Ok(records(3)), Ok(records(4))]);
    let extractor = Extractor::new(&source, 500, 1000, start_date());

    let company = extractor.fetch_all(resource("company")).await.unwrap();
    assert_eq!(company.records.len(), 3);
    assert_eq!(company.stop, StopReason::SinglePage);

    let statement = extractor
        .fetch_all(resource("account-statement"))
        .await
        .unwrap();
    assert_eq!(statement.records.len(), 4);

    let requests = source.requests();
    assert_eq!(requests[0], PageRequest::default());
    assert_eq!(requests[1].page, None);
    assert_eq!(requests[1].window.map(|w| w.from), Some(start_date()));
}

// ============================================================================
// Bridge source
// ============================================================================

#[test]
fn test_bridge_rejects_empty_command() {
    assert!(BridgeSource::new(Vec::new()).is_err());
}

#[test]
fn test_bridge_check_ready_missing_script() {
    let dir = tempfile::tempdir().unwrap();
    let source = BridgeSource::new(vec!["node".into(), "scripts/mcp_bridge.js".into()])
        .unwrap()
        .with_working_dir(dir.path());

    let err = source.check_ready().unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));

    std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
    std::fs::write(dir.path().join("scripts/mcp_bridge.js"), "").unwrap();
    source.check_ready().unwrap();
}

#[test]
fn test_bridge_endpoint_requires_tool() {
    let source = BridgeSource::new(vec!["node".into()]).unwrap();
    assert_eq!(
        source.endpoint(resource("customers")).unwrap(),
        "payday_get_customers"
    );
    assert!(source.endpoint(resource("transactions")).is_err());
}

#[cfg(unix)]
mod subprocess {
    use super::*;
    use pretty_assertions::assert_eq;

    const STUB: &str = r#"#!/bin/sh
case "$1" in
  payday_get_customers) echo '{"ok":true,"data":{"customers":[{"id":"c1"},{"id":"c2"}],"total":2}}' ;;
  payday_get_company) printf '{"ok":true,"data":%s}\n' "$2" ;;
  payday_get_invoices) echo 'bridge crashed' >&2; exit 3 ;;
  payday_get_expenses) ;;
  *) echo '{"ok":false,"error":"unknown tool"}' ;;
esac
"#;

    fn stub_source(dir: &tempfile::TempDir) -> BridgeSource {
        let script = dir.path().join("bridge_stub.sh");
        std::fs::write(&script, STUB).unwrap();
        BridgeSource::new(vec!["sh".into(), script.display().to_string()]).unwrap()
    }

    #[tokio::test]
    async fn test_bridge_nested_collection() {
        let dir = tempfile::tempdir().unwrap();
        let source = stub_source(&dir);
        let request = PageRequest {
            page: Some(1),
            page_size: Some(500),
            window: None,
        };

        let page = source
            .fetch_page(resource("customers"), &request)
            .await
            .unwrap();
        assert_eq!(page, vec![json!({"id": "c1"}), json!({"id": "c2"})]);
        assert_eq!(source.source_tag(), "payday-mcp");
    }

    #[tokio::test]
    async fn test_bridge_passes_json_args() {
        let dir = tempfile::tempdir().unwrap();
        let source = stub_source(&dir);
        let request = PageRequest {
            page: Some(4),
            page_size: Some(50),
            window: None,
        };

        let page = source
            .fetch_page(resource("company"), &request)
            .await
            .unwrap();
        assert_eq!(page, vec![json!({"page": 4, "perpage": 50})]);
    }

    #[tokio::test]
    async fn test_bridge_failures() {
        let dir = tempfile::tempdir().unwrap();
        let source = stub_source(&dir);

        let crashed = source
            .fetch_page(resource("invoices"), &PageRequest::default())
            .await
            .unwrap_err();
        assert!(crashed.to_string().contains("bridge crashed"));

        let empty = source
            .fetch_page(resource("expenses"), &PageRequest::default())
            .await
            .unwrap_err();
        assert!(empty.to_string().contains("Empty response"));

        let not_ok = source
            .fetch_page(resource("payments"), &PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(not_ok, Error::Bridge { ref message, .. } if message == "unknown tool"));
    }
}
