//! Gold layer
//!
//! Maps accounts to reporting groups from the account-groups CSV and builds
//! the dimension, fact and reporting views (P&L, balance sheet, KPIs,
//! account detail). Views can be exported to Parquet.

use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::template::{self, TemplateContext};
use crate::warehouse::Warehouse;

/// Gold build script
pub const GOLD_SQL: &str = include_str!("../../sql/02_gold_build.sql");

/// Gold Parquet export script
pub const GOLD_EXPORT_SQL: &str = include_str!("../../sql/03_gold_export.sql");

static EXPORT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*paths\.gold_dir\s*\}\}/([A-Za-z0-9_]+\.parquet)")
        .expect("export target regex is valid")
});

/// Summary of a Gold build
#[derive(Debug, Clone, Default, Serialize)]
pub struct GoldReport {
    /// Rows in `gold.dim_account`
    pub dim_account_rows: usize,
    /// Accounts without a matching group
    pub unmapped_accounts: usize,
    /// Rows in `gold.fact_txn`
    pub fact_rows: usize,
    /// Months in `gold.v_kpi_month`
    pub kpi_months: usize,
    /// Parquet files written
    pub exported: Vec<PathBuf>,
}

/// Paths the Gold scripts read and write
#[derive(Debug, Clone)]
pub struct GoldPaths {
    /// Account-groups CSV
    pub account_groups: PathBuf,
    /// Export directory; `None` skips the Parquet export
    pub export_dir: Option<PathBuf>,
}

impl GoldPaths {
    fn context(&self) -> TemplateContext {
        let gold_dir = self
            .export_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        TemplateContext::with_vars(json!({
            "paths": {
                "account_groups": self.account_groups.display().to_string(),
                "gold_dir": gold_dir,
            }
        }))
    }
}

/// Parquet file names written by the export script
pub fn export_file_names() -> Vec<String> {
    EXPORT_TARGET
        .captures_iter(GOLD_EXPORT_SQL)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Build the Gold layer on top of a built Silver layer
pub fn build(warehouse: &Warehouse, paths: &GoldPaths) -> Result<GoldReport> {
    if !paths.account_groups.is_file() {
        return Err(Error::FileNotFound {
            path: paths.account_groups.display().to_string(),
        });
    }

    let ctx = paths.context();
    warehouse.execute_script(&template::render_sql(GOLD_SQL, &ctx)?)?;

    let mut report = GoldReport {
        dim_account_rows: warehouse.count("gold.dim_account")?,
        unmapped_accounts: usize::try_from(warehouse.query_i64(
            "SELECT COUNT(*) FROM gold.dim_account WHERE group_name = 'Unmapped'",
        )?)
        .unwrap_or(0),
        fact_rows: warehouse.count("gold.fact_txn")?,
        kpi_months: warehouse.count("gold.v_kpi_month")?,
        exported: Vec::new(),
    };
    info!(
        "Gold: {} accounts ({} unmapped), {} fact rows, {} KPI months",
        report.dim_account_rows, report.unmapped_accounts, report.fact_rows, report.kpi_months
    );

    if let Some(dir) = &paths.export_dir {
        report.exported = export(warehouse, dir, &ctx)?;
    }

    Ok(report)
}

fn export(warehouse: &Warehouse, dir: &Path, ctx: &TemplateContext) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    warehouse.execute_script(&template::render_sql(GOLD_EXPORT_SQL, ctx)?)?;

    let files: Vec<PathBuf> = export_file_names()
        .into_iter()
        .map(|name| dir.join(name))
        .collect();
    info!("Exported {} Gold files to {}", files.len(), dir.display());
    Ok(files)
}
