//! HTTP client module
//!
//! HTTP client with retry, rate limiting, and backoff strategies used by
//! the REST source.

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
