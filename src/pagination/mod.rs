//! Pagination module
//!
//! Page-number pagination as used by every paginated Payday resource, plus a
//! no-op paginator for single-call resources. A page shorter than the page
//! size is the last one.

mod strategies;
mod types;

pub use strategies::{NoPaginator, PageNumberPaginator};
pub use types::{NextPage, PaginationState, Paginator, StopReason};
