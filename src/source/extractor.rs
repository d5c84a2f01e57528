//! Drives a record source through a resource's fetch strategy

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{PageRequest, RecordSource};
use crate::error::Result;
use crate::pagination::{
    NextPage, NoPaginator, PageNumberPaginator, PaginationState, Paginator, StopReason,
};
use crate::resources::{DateWindow, FetchStrategy, Resource};

/// Records fetched for one resource
#[derive(Debug, Clone)]
pub struct Extraction {
    /// All records in fetch order
    pub records: Vec<Value>,
    /// Pages that returned a response
    pub pages_fetched: u32,
    /// Why fetching stopped
    pub stop: StopReason,
}

/// Fetches every record of a resource from a source
pub struct Extractor<'a> {
    source: &'a dyn RecordSource,
    page_size: u32,
    max_pages: u32,
    statement_from: NaiveDate,
}

impl<'a> Extractor<'a> {
    /// Create an extractor
    pub fn new(
        source: &'a dyn RecordSource,
        page_size: u32,
        max_pages: u32,
        statement_from: NaiveDate,
    ) -> Self {
        Self {
            source,
            page_size,
            max_pages,
            statement_from,
        }
    }

    /// Fetch all records of a resource
    ///
    /// A failure on the first page fails the resource. A failure on a later
    /// page ends pagination and keeps what was already fetched.
    pub async fn fetch_all(&self, resource: &Resource) -> Result<Extraction> {
        let paginator: Box<dyn Paginator> = match resource.strategy {
            FetchStrategy::Paginated => {
                Box::new(PageNumberPaginator::new(self.page_size, self.max_pages))
            }
            FetchStrategy::Single | FetchStrategy::DateRange => Box::new(NoPaginator),
        };

        let window = match resource.strategy {
            FetchStrategy::DateRange => {
                let window = DateWindow::until_today(self.statement_from);
                info!(
                    "Fetching {} from {} to {}",
                    resource.name, window.from, window.to
                );
                Some(window)
            }
            _ => None,
        };

        let mut state = PaginationState::new();
        let mut page = paginator.first_page(&mut state);
        let mut records = Vec::new();

        let stop = loop {
            let request = PageRequest {
                page,
                page_size: paginator.page_size(),
                window,
            };

            let batch = match self.source.fetch_page(resource, &request).await {
                Ok(batch) => batch,
                Err(e) if state.pages_fetched == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        "{} page {} failed, stopping pagination: {}",
                        resource.name,
                        page.unwrap_or(state.page),
                        e
                    );
                    state.mark_done();
                    break StopReason::PageFailed;
                }
            };

            let count = batch.len();
            records.extend(batch);

            match paginator.process_page(count, &mut state) {
                NextPage::Continue { page: next } => {
                    info!(
                        "{} page {}: got {} items, total: {}",
                        resource.name, state.pages_fetched, count, state.total_fetched
                    );
                    page = Some(next);
                }
                NextPage::Done(StopReason::MaxPages) => {
                    warn!(
                        "{} reached the limit of {} pages, remaining records not fetched",
                        resource.name, self.max_pages
                    );
                    break StopReason::MaxPages;
                }
                NextPage::Done(reason) => {
                    debug!(
                        "{} finished after {} page(s): {}",
                        resource.name, state.pages_fetched, reason
                    );
                    break reason;
                }
            }
        };

        Ok(Extraction {
            records,
            pages_fetched: state.pages_fetched,
            stop,
        })
    }
}
