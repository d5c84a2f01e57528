//! Bronze staging tables
//!
//! Loads every snapshot of a resource into `bronze.<resource>_raw` and makes
//! sure the columns the Silver script reads are present, so an empty or
//! partial Bronze layer still builds.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::bronze::{self, INGESTED_AT, RESOURCE, SOURCE};
use crate::error::Result;
use crate::resources::table_name;
use crate::types::Layer;
use crate::warehouse::{sql_literal, Warehouse};

/// A resource feeding Silver and the raw columns Silver reads from it
#[derive(Debug, Clone, Copy)]
pub struct StagedResource {
    /// Resource name (Bronze directory)
    pub resource: &'static str,
    /// Columns the Silver script references
    pub columns: &'static [&'static str],
}

const LEDGER_COLUMNS: &[&str] = &[
    "id",
    "date",
    "accountCode",
    "accountName",
    "description",
    "reference",
    "debit",
    "credit",
    "amount",
];

/// Resources staged for Silver
pub const STAGED_RESOURCES: &[StagedResource] = &[
    StagedResource {
        resource: "accounts",
        columns: &["id", "code", "name", "type", "group", "isActive"],
    },
    StagedResource {
        resource: "account-statement",
        columns: LEDGER_COLUMNS,
    },
    StagedResource {
        resource: "transactions",
        columns: LEDGER_COLUMNS,
    },
    StagedResource {
        resource: "customers",
        columns: &["id", "name", "email", "ssn", "created"],
    },
    StagedResource {
        resource: "invoices",
        columns: &[
            "id",
            "number",
            "customerId",
            "customerName",
            "invoiceDate",
            "dueDate",
            "status",
            "currency",
            "amountExcludingVat",
            "amountIncludingVat",
        ],
    },
    StagedResource {
        resource: "payments",
        columns: &["id", "invoiceId", "paymentDate", "amount", "paymentType"],
    },
    StagedResource {
        resource: "expenses",
        columns: &[
            "id",
            "date",
            "accountCode",
            "creditorName",
            "description",
            "status",
            "amountExcludingVat",
            "amountIncludingVat",
        ],
    },
];

const METADATA_COLUMNS: &[&str] = &[INGESTED_AT, SOURCE, RESOURCE];

impl StagedResource {
    /// Qualified staging table name
    pub fn raw_table(&self) -> String {
        format!("{}.{}_raw", Layer::Bronze.schema(), table_name(self.resource))
    }

    fn expected_columns(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().chain(METADATA_COLUMNS.iter()).copied()
    }
}

/// What was staged for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Resource name
    pub resource: String,
    /// Snapshot files loaded
    pub snapshots: usize,
    /// Rows in the staging table
    pub rows: usize,
    /// Columns added as NULL because no snapshot had them
    pub added_columns: Vec<String>,
}

/// Create every `bronze.<resource>_raw` table from the Bronze directory
pub fn stage_bronze(warehouse: &Warehouse, bronze_dir: &Path) -> Result<Vec<StageReport>> {
    warehouse.execute_script(&format!(
        "CREATE SCHEMA IF NOT EXISTS {};",
        Layer::Bronze.schema()
    ))?;

    STAGED_RESOURCES
        .iter()
        .map(|staged| stage_resource(warehouse, bronze_dir, staged))
        .collect()
}

fn stage_resource(
    warehouse: &Warehouse,
    bronze_dir: &Path,
    staged: &StagedResource,
) -> Result<StageReport> {
    let table = staged.raw_table();
    let files = bronze::snapshots(&bronze_dir.join(staged.resource))?;

    if files.is_empty() {
        let columns = staged
            .expected_columns()
            .map(|c| format!("\"{c}\" VARCHAR"))
            .collect::<Vec<_>>()
            .join(", ");
        warehouse.execute_script(&format!("CREATE OR REPLACE TABLE {table} ({columns});"))?;
        debug!("{}: no snapshots, created empty {}", staged.resource, table);
    } else {
        let list = files
            .iter()
            .map(|f| sql_literal(&f.display().to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        warehouse.execute_script(&format!(
            "CREATE OR REPLACE TABLE {table} AS SELECT * FROM read_json_auto([{list}], \
             format = 'newline_delimited', union_by_name = true, sample_size = -1);"
        ))?;
    }

    let present: HashSet<String> = warehouse
        .columns(&table)?
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();

    let mut added_columns = Vec::new();
    for column in staged.expected_columns() {
        if present.contains(&column.to_lowercase()) {
            continue;
        }
        warehouse.execute_script(&format!(
            "ALTER TABLE {table} ADD COLUMN \"{column}\" VARCHAR;"
        ))?;
        added_columns.push(column.to_string());
    }

    let rows = warehouse.count(&table)?;
    if !files.is_empty() {
        info!(
            "Staged {}: {} rows from {} snapshot(s)",
            staged.resource,
            rows,
            files.len()
        );
    }
    if !added_columns.is_empty() {
        debug!("{}: added missing columns {:?}", table, added_columns);
    }

    Ok(StageReport {
        resource: staged.resource.to_string(),
        snapshots: files.len(),
        rows,
        added_columns,
    })
}
