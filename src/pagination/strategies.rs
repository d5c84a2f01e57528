//! Pagination strategy implementations

use super::types::{NextPage, PaginationState, Paginator, StopReason};

// ============================================================================
// No Pagination
// ============================================================================

/// Single request, no pagination
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn first_page(&self, _state: &mut PaginationState) -> Option<u32> {
        None
    }

    fn page_size(&self) -> Option<u32> {
        None
    }

    fn process_page(&self, records_count: usize, state: &mut PaginationState) -> NextPage {
        state.add_page(records_count);
        state.mark_done();
        NextPage::Done(StopReason::SinglePage)
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination
///
/// Payday pages are 1-based: `?page=1&pageSize=500` over REST,
/// `{"page": 1, "perpage": 500}` through the bridge.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// First page number
    pub start_page: u32,
    /// Records requested per page
    pub page_size: u32,
    /// Safety limit on the number of pages
    pub max_pages: u32,
}

impl Default for PageNumberPaginator {
    fn default() -> Self {
        Self {
            start_page: 1,
            page_size: 500,
            max_pages: 1000,
        }
    }
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size,
            max_pages,
            ..Self::default()
        }
    }
}

impl Paginator for PageNumberPaginator {
    fn first_page(&self, state: &mut PaginationState) -> Option<u32> {
        state.page = self.start_page;
        Some(self.start_page)
    }

    fn page_size(&self) -> Option<u32> {
        Some(self.page_size)
    }

    fn process_page(&self, records_count: usize, state: &mut PaginationState) -> NextPage {
        // The terminal empty page is not a fetched page
        if records_count == 0 {
            state.mark_done();
            return NextPage::Done(StopReason::EmptyPage);
        }
        state.add_page(records_count);

        if records_count < self.page_size as usize {
            state.mark_done();
            return NextPage::Done(StopReason::ShortPage);
        }

        if state.pages_fetched >= self.max_pages {
            state.mark_done();
            return NextPage::Done(StopReason::MaxPages);
        }

        state.page += 1;
        NextPage::Continue { page: state.page }
    }
}
