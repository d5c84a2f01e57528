//! Pagination types and traits

use std::fmt;

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page contained no records
    EmptyPage,
    /// The page held fewer records than the page size
    ShortPage,
    /// The safety limit on page count was reached
    MaxPages,
    /// The resource is not paginated
    SinglePage,
    /// A page after the first failed; earlier pages are kept
    PageFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EmptyPage => "empty page",
            StopReason::ShortPage => "short page",
            StopReason::MaxPages => "max pages reached",
            StopReason::SinglePage => "single page",
            StopReason::PageFailed => "page failed",
        };
        f.write_str(text)
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Request this page number next
    Continue {
        /// Page number to request
        page: u32,
    },
    /// No more pages
    Done(StopReason),
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Page most recently requested (0 before the first request)
    pub page: u32,
    /// Pages that returned at least one record
    pub pages_fetched: u32,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record a fetched page
    pub fn add_page(&mut self, records: usize) {
        self.pages_fetched += 1;
        self.total_fetched += records as u64;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Page number for the first request, `None` if unpaginated
    fn first_page(&self, state: &mut PaginationState) -> Option<u32>;

    /// Page size to request, if any
    fn page_size(&self) -> Option<u32>;

    /// Process a page of `records_count` records and decide what comes next
    fn process_page(&self, records_count: usize, state: &mut PaginationState) -> NextPage;
}
