//! DuckDB warehouse
//!
//! Holds the `bronze`, `silver` and `gold` schemas in a single DuckDB file.

mod engine;

pub use engine::{duckdb_value_to_json, is_qualified_identifier, sql_literal, Warehouse};
