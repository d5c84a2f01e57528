//! Authentication module
//!
//! Supports: Bearer token, OAuth2 client credentials
//!
//! The `Authenticator` caches client-credentials tokens and refreshes them
//! shortly before they expire.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken};
