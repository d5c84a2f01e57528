// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # payday-etl
//!
//! A Bronze → Silver → Gold accounting pipeline for the Payday finance API,
//! built on an embedded DuckDB warehouse.
//!
//! ## Layers
//!
//! - **Bronze**: raw JSONL (and Parquet) snapshots, one per resource per run
//! - **Silver**: typed, deduplicated tables plus quality-check views
//! - **Gold**: account dimension, transaction fact, P&L, balance sheet,
//!   KPI-by-month and account detail views, exported to Parquet
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payday_etl::{config::PipelineConfig, pipeline::Pipeline, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::load(None)?;
//!     let pipeline = Pipeline::new(config);
//!
//!     let summary = pipeline.fetch().await?;
//!     println!("{} records fetched", summary.total_records);
//!
//!     let report = pipeline.build()?;
//!     println!("{} KPI months", report.gold.kpi_months);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────┐   ┌───────────────────┐
//! │ RecordSource         │   │ Bronze           │   │ Warehouse (DuckDB)│
//! │  HttpSource (REST)   │──▶│  JSONL snapshots │──▶│  silver.*  gold.* │
//! │  BridgeSource (MCP)  │   │  Parquet copies  │   │  Parquet exports  │
//! └──────────────────────┘   └──────────────────┘   └───────────────────┘
//!   auth · http · pagination                          sql/*.sql scripts
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration
pub mod config;

/// Authentication implementations
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Payday resource catalog
pub mod resources;

/// Record sources (REST API, MCP bridge)
pub mod source;

/// Bronze snapshots
pub mod bronze;

/// Arrow/Parquet output
pub mod output;

/// DuckDB warehouse
pub mod warehouse;

/// Template interpolation
pub mod template;

/// Silver layer
pub mod silver;

/// Gold layer
pub mod gold;

/// Pipeline orchestration
pub mod pipeline;

/// JSON export of warehouse views
pub mod export;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::PipelineConfig;
pub use pipeline::Pipeline;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
