//! Silver layer
//!
//! Typed, deduplicated accounting tables built from Bronze snapshots, plus
//! quality-check views. Every snapshot of a resource is read; duplicates
//! keep the row with the latest ingestion time.

mod report;
mod staging;

pub use report::{
    AccountTypeSummary, DateRange, IssueCount, OrphanSample, QualityPolicy, SilverReport,
    TableCount, SILVER_TABLES,
};
pub use staging::{stage_bronze, StageReport, StagedResource, STAGED_RESOURCES};

use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::warehouse::Warehouse;

/// Silver build script
pub const SILVER_SQL: &str = include_str!("../../sql/01_silver_build.sql");

/// Stage Bronze, run the Silver script and enforce the quality policy
pub fn build(warehouse: &Warehouse, bronze_dir: &Path, policy: QualityPolicy) -> Result<SilverReport> {
    let staged = stage_bronze(warehouse, bronze_dir)?;
    let staged_rows: usize = staged.iter().map(|s| s.rows).sum();
    info!(
        "Staged {} Bronze rows across {} resources",
        staged_rows,
        staged.len()
    );

    warehouse.execute_script(SILVER_SQL)?;

    let report = SilverReport::collect(warehouse)?;
    report.log();
    policy.enforce(&report)?;
    Ok(report)
}
