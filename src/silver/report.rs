//! Silver build report and quality gate

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::warehouse::Warehouse;

/// Tables counted in the report
pub const SILVER_TABLES: &[&str] = &[
    "silver.accounts",
    "silver.transactions",
    "silver.customers",
    "silver.invoices",
    "silver.payments",
    "silver.expenses",
];

const ORPHAN_SAMPLE_SIZE: usize = 5;

/// Row count of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    /// Qualified table name
    pub table: String,
    /// Rows
    pub rows: usize,
}

/// A transaction whose account code has no account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanSample {
    pub txn_id: String,
    pub account_code: Option<String>,
    pub account_name: Option<String>,
}

/// Count of transactions with one kind of missing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCount {
    pub issue_type: String,
    pub count: usize,
}

/// Row of `silver.v_account_summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTypeSummary {
    pub account_type: String,
    pub account_group: String,
    pub statement: String,
    pub account_count: usize,
    pub active_count: usize,
}

/// Transaction date coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: String,
    pub latest: String,
    pub unique_dates: usize,
}

/// Summary of a Silver build
#[derive(Debug, Clone, Serialize)]
pub struct SilverReport {
    pub row_counts: Vec<TableCount>,
    pub orphan_count: usize,
    pub orphan_samples: Vec<OrphanSample>,
    pub missing_count: usize,
    pub missing_fields: Vec<IssueCount>,
    pub account_summary: Vec<AccountTypeSummary>,
    pub date_range: Option<DateRange>,
}

impl SilverReport {
    /// Collect the report from a freshly built warehouse
    pub fn collect(warehouse: &Warehouse) -> Result<Self> {
        let row_counts = SILVER_TABLES
            .iter()
            .map(|table| {
                Ok(TableCount {
                    table: (*table).to_string(),
                    rows: warehouse.count(table)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let orphan_count = warehouse.count("silver.qc_orphan_txn_accounts")?;
        let orphan_samples = query_as(
            warehouse,
            &format!(
                "SELECT txn_id, account_code, account_name FROM silver.qc_orphan_txn_accounts \
                 ORDER BY txn_id LIMIT {ORPHAN_SAMPLE_SIZE}"
            ),
        )?;

        let missing_count = warehouse.count("silver.qc_missing_fields")?;
        let missing_fields = query_as(
            warehouse,
            "SELECT issue_type, COUNT(*) AS count FROM silver.qc_missing_fields \
             GROUP BY 1 ORDER BY 1",
        )?;

        let account_summary = query_as(
            warehouse,
            "SELECT * FROM silver.v_account_summary \
             ORDER BY account_count DESC, account_type, account_group",
        )?;

        let date_range = query_as::<DateRange>(
            warehouse,
            "SELECT MIN(txn_date) AS earliest, MAX(txn_date) AS latest, \
             COUNT(DISTINCT txn_date) AS unique_dates \
             FROM silver.transactions HAVING COUNT(txn_date) > 0",
        )?
        .into_iter()
        .next();

        Ok(Self {
            row_counts,
            orphan_count,
            orphan_samples,
            missing_count,
            missing_fields,
            account_summary,
            date_range,
        })
    }

    /// Row count for a table, if it was counted
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.row_counts
            .iter()
            .find(|c| c.table == table)
            .map(|c| c.rows)
    }

    /// Log the report, warning about quality issues
    pub fn log(&self) {
        for count in &self.row_counts {
            info!("{}: {} records", count.table, count.rows);
        }

        if self.orphan_count > 0 {
            warn!("Orphan txn→account rows: {}", self.orphan_count);
            for sample in &self.orphan_samples {
                warn!(
                    "  Txn {}: account_code={}, account_name={}",
                    sample.txn_id,
                    sample.account_code.as_deref().unwrap_or("-"),
                    sample.account_name.as_deref().unwrap_or("-")
                );
            }
        }

        if self.missing_count > 0 {
            warn!("Missing critical fields: {}", self.missing_count);
            for issue in &self.missing_fields {
                warn!("  {}: {} transactions", issue.issue_type, issue.count);
            }
        }

        for row in &self.account_summary {
            info!(
                "  {} | {} | {}: {} total, {} active",
                row.account_type, row.account_group, row.statement, row.account_count, row.active_count
            );
        }

        match &self.date_range {
            Some(range) => info!(
                "Date range: {} to {} ({} unique dates)",
                range.earliest, range.latest, range.unique_dates
            ),
            None => info!("No dated transactions"),
        }
    }
}

/// What a failed quality check does to the build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    /// Fail when transactions reference unknown accounts
    pub fail_on_orphans: bool,
    /// Fail when transactions lack a date, account or amount
    pub fail_on_missing: bool,
}

impl QualityPolicy {
    /// Apply the policy to a report
    pub fn enforce(&self, report: &SilverReport) -> Result<()> {
        if self.fail_on_orphans && report.orphan_count > 0 {
            return Err(Error::QualityGate {
                check: "qc_orphan_txn_accounts".to_string(),
                count: report.orphan_count,
            });
        }
        if self.fail_on_missing && report.missing_count > 0 {
            return Err(Error::QualityGate {
                check: "qc_missing_fields".to_string(),
                count: report.missing_count,
            });
        }
        Ok(())
    }
}

fn query_as<T: DeserializeOwned>(warehouse: &Warehouse, sql: &str) -> Result<Vec<T>> {
    warehouse
        .query_json(sql)?
        .into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(Error::from))
        .collect()
}
