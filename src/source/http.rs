//! Payday REST API source

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{PageRequest, RecordSource};
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use crate::resources::{FetchStrategy, Resource};

/// Fetches records over the Payday REST API
#[derive(Debug)]
pub struct HttpSource {
    client: HttpClient,
}

impl HttpSource {
    /// Wrap an authenticated HTTP client whose base URL points at the API
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn source_tag(&self) -> &'static str {
        "payday"
    }

    fn endpoint(&self, resource: &Resource) -> Result<String> {
        Ok(resource.route.to_string())
    }

    async fn fetch_page(&self, resource: &Resource, request: &PageRequest) -> Result<Vec<Value>> {
        let mut config = RequestConfig::new();
        if let Some(page) = request.page {
            config = config.query("page", page.to_string());
        }
        if let Some(size) = request.page_size {
            config = config.query("pageSize", size.to_string());
        }
        if let Some(window) = request.window {
            config = config
                .query("dateFrom", window.from.format("%Y-%m-%d").to_string())
                .query("dateTo", window.to.format("%Y-%m-%d").to_string());
        }

        debug!("GET {} page={:?}", resource.route, request.page);
        let body: Value = self.client.get_json_with_config(resource.route, config).await?;
        Ok(records_from_body(resource.strategy, body))
    }
}

/// Extract the record list from a REST response body
///
/// A top-level array is the record list. Otherwise the `items` array is used,
/// then the `data` array. Anything else holds no records.
pub fn normalize_http_body(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ["items", "data"]
            .into_iter()
            .find_map(|key| match map.remove(key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Records for a resource fetched with `strategy`
///
/// Single-object routes such as `/v1/company` answer with the record itself,
/// so a bare object is one record there. Collection routes use
/// [`normalize_http_body`].
pub fn records_from_body(strategy: FetchStrategy, body: Value) -> Vec<Value> {
    match body {
        Value::Object(map)
            if strategy == FetchStrategy::Single
                && !map.contains_key("items")
                && !map.contains_key("data") =>
        {
            vec![Value::Object(map)]
        }
        other => normalize_http_body(other),
    }
}
