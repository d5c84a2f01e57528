//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `fetch` - Pull resources into a Bronze snapshot
//! - `convert` - Latest Bronze snapshots to Parquet
//! - `build` - Silver and Gold into the warehouse
//! - `validate` - Check assets and build in memory
//! - `export` - A view as JSON
//! - `run` - Fetch then build
//! - `resources` - List known resources

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
