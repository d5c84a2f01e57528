//! Record sources
//!
//! A [`RecordSource`] fetches one page of raw records for a resource. Two
//! implementations exist: the Payday REST API and the local MCP bridge
//! subprocess. The [`Extractor`] drives either one through pagination.

mod bridge;
mod extractor;
mod http;

pub use bridge::{normalize_bridge_data, BridgeResponse, BridgeSource};
pub use extractor::{Extraction, Extractor};
pub use http::{normalize_http_body, records_from_body, HttpSource};

use async_trait::async_trait;

use crate::error::Result;
use crate::resources::{DateWindow, Resource};
use crate::types::JsonValue;

/// Parameters for a single page request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number for paginated resources
    pub page: Option<u32>,
    /// Records per page for paginated resources
    pub page_size: Option<u32>,
    /// Date window for date-range resources
    pub window: Option<DateWindow>,
}

/// Something that can fetch raw Payday records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Value written to `_source_` on every Bronze record
    fn source_tag(&self) -> &'static str;

    /// Human readable endpoint for a resource (route or tool name)
    fn endpoint(&self, resource: &Resource) -> Result<String>;

    /// Fetch one page of records
    async fn fetch_page(&self, resource: &Resource, request: &PageRequest)
        -> Result<Vec<JsonValue>>;
}

#[cfg(test)]
mod tests;
