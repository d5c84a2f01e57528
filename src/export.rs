//! JSON export of warehouse views

use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::JsonObject;
use crate::warehouse::{is_qualified_identifier, Warehouse};

/// Default row limit
pub const DEFAULT_LIMIT: usize = 2000;

/// Output target meaning stdout
pub const STDOUT: &str = "-";

/// What to export and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// View or table, e.g. `gold.v_kpi_month`
    pub view: String,
    /// Optional `WHERE` condition
    pub where_clause: Option<String>,
    /// Optional `ORDER BY` expression; defaults to the first column descending
    pub order: Option<String>,
    /// Maximum rows
    pub limit: usize,
    /// Output file, or `-` for stdout
    pub out: String,
}

impl ExportRequest {
    /// Export of a whole view to stdout
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            where_clause: None,
            order: None,
            limit: DEFAULT_LIMIT,
            out: STDOUT.to_string(),
        }
    }

    /// The query this request runs
    pub fn sql(&self) -> Result<String> {
        if !is_qualified_identifier(&self.view) {
            return Err(Error::invalid_value(
                "view",
                format!("'{}' is not a table or view name", self.view),
            ));
        }

        let mut sql = format!("SELECT * FROM {}", self.view);
        if let Some(condition) = non_blank(self.where_clause.as_deref()) {
            sql.push_str(&format!(" WHERE {condition}"));
        }
        match non_blank(self.order.as_deref()) {
            Some(order) => sql.push_str(&format!(" ORDER BY {order}")),
            None => sql.push_str(" ORDER BY 1 DESC"),
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));
        Ok(sql)
    }

    fn to_stdout(&self) -> bool {
        self.out.trim().is_empty() || self.out == STDOUT
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Run the request's query
pub fn query(warehouse: &Warehouse, request: &ExportRequest) -> Result<Vec<JsonObject>> {
    let sql = request.sql()?;
    info!("Executing: {}", sql);

    let rows = warehouse.query_json(&sql)?;
    if rows.is_empty() {
        warn!("No data returned from {}", request.view);
    }
    Ok(rows)
}

/// Rows as a pretty-printed JSON array
pub fn render(rows: &[JsonObject]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Export from the warehouse file and write the JSON; returns the row count
///
/// The warehouse connection is closed whether or not the export succeeds.
pub fn export(warehouse_path: &Path, request: &ExportRequest) -> Result<usize> {
    if !warehouse_path.is_file() {
        return Err(Error::FileNotFound {
            path: warehouse_path.display().to_string(),
        });
    }

    let warehouse = Warehouse::open(warehouse_path)?;
    let rows = query(&warehouse, request);
    warehouse.close()?;
    let rows = rows?;

    let payload = render(&rows)?;
    if request.to_stdout() {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{payload}")?;
        out.flush()?;
    } else {
        let path = Path::new(&request.out);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, payload)?;
        info!("Wrote {} rows to {}", rows.len(), request.out);
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use test_case::test_case;

    fn seeded_warehouse(path: &Path) {
        let wh = Warehouse::open(path).unwrap();
        wh.execute_script(
            "CREATE SCHEMA gold;
             CREATE TABLE gold.kpi (month DATE, revenue DECIMAL(18,2), note VARCHAR);
             INSERT INTO gold.kpi VALUES
                 (DATE '2024-01-01', 100.50, 'Jón'),
                 (DATE '2024-02-01', 200.00, NULL),
                 (DATE '2024-03-01', 50.25, 'x');",
        )
        .unwrap();
        wh.close().unwrap();
    }

    #[test]
    fn test_sql_defaults() {
        let request = ExportRequest::new("gold.v_kpi_month");
        assert_eq!(
            request.sql().unwrap(),
            "SELECT * FROM gold.v_kpi_month ORDER BY 1 DESC LIMIT 2000"
        );
        assert_eq!(request.out, "-");
    }

    #[test]
    fn test_sql_with_filters() {
        let request = ExportRequest {
            where_clause: Some("month >= '2024-01-01'".into()),
            order: Some("month".into()),
            limit: 12,
            ..ExportRequest::new("gold.v_pl_month")
        };
        assert_eq!(
            request.sql().unwrap(),
            "SELECT * FROM gold.v_pl_month WHERE month >= '2024-01-01' ORDER BY month LIMIT 12"
        );
    }

    #[test_case("gold.v_kpi_month; DROP TABLE x" ; "statement injection")]
    #[test_case("" ; "empty")]
    #[test_case("gold.v kpi" ; "whitespace")]
    fn test_sql_rejects_bad_view(view: &str) {
        assert!(ExportRequest::new(view).sql().is_err());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("finance.duckdb");
        seeded_warehouse(&db);
        let out = dir.path().join("out").join("kpi.json");

        let request = ExportRequest {
            out: out.display().to_string(),
            ..ExportRequest::new("gold.kpi")
        };
        let rows = export(&db, &request).unwrap();
        assert_eq!(rows, 3);

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(
            written[0],
            json!({"month": "2024-03-01", "revenue": 50.25, "note": "x"})
        );
        assert_eq!(written[2]["note"], json!("Jón"));
        assert_eq!(written[1]["note"], json!(null));

        // the connection was released
        Warehouse::open(&db).unwrap().close().unwrap();
    }

    #[test]
    fn test_export_empty_result() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("finance.duckdb");
        seeded_warehouse(&db);
        let out = dir.path().join("empty.json");

        let request = ExportRequest {
            where_clause: Some("revenue > 1000".into()),
            out: out.display().to_string(),
            ..ExportRequest::new("gold.kpi")
        };
        assert_eq!(export(&db, &request).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "[]");
    }

    #[test]
    fn test_export_missing_warehouse() {
        let dir = tempdir().unwrap();
        let err = export(&dir.path().join("none.duckdb"), &ExportRequest::new("gold.kpi"))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_query_error_still_closes() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("finance.duckdb");
        seeded_warehouse(&db);

        let err = export(&db, &ExportRequest::new("gold.missing_view")).unwrap_err();
        assert!(matches!(err, Error::Warehouse { .. }));
        Warehouse::open(&db).unwrap().close().unwrap();
    }
}
