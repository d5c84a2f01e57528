//! DuckDB warehouse connection
//!
//! One `Warehouse` wraps one DuckDB connection. Pipeline steps open their own
//! and close it before the next step runs, which releases the file lock.

use crate::error::{Error, Result};
use crate::types::JsonObject;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, Value as DbValue};
use duckdb::Connection;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// `name` or `schema.name`, letters, digits and underscores only
static QUALIFIED_IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("identifier regex is valid")
});

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

/// Check that a table or view name is a plain (optionally dotted) identifier
pub fn is_qualified_identifier(name: &str) -> bool {
    QUALIFIED_IDENT.is_match(name)
}

/// Quote a string as a SQL literal
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// DuckDB warehouse
pub struct Warehouse {
    conn: Connection,
    location: String,
}

impl Warehouse {
    /// Open (or create) a warehouse file, creating its parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            Error::warehouse(format!("Failed to open {}: {e}", path.display()))
        })?;
        debug!("Opened warehouse {}", path.display());
        Ok(Self {
            conn,
            location: path.display().to_string(),
        })
    }

    /// Open a throwaway in-memory warehouse
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::warehouse(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self {
            conn,
            location: ":memory:".to_string(),
        })
    }

    /// Run one or more SQL statements
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Row count of a table or view
    pub fn count(&self, table: &str) -> Result<usize> {
        ensure_identifier(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Run a query returning a single integer (NULL reads as 0)
    pub fn query_i64(&self, sql: &str) -> Result<i64> {
        let value: Option<i64> = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(value.unwrap_or(0))
    }

    /// Does a table or view exist (`schema.name` or `name` in `main`)
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let (schema, name) = split_qualified(table);
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ?",
            duckdb::params![schema, name],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// Column names of a table or view in declaration order
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let (schema, name) = split_qualified(table);
        let mut stmt = self.conn.prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map(duckdb::params![schema, name], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Run a query and return its rows as JSON objects
    ///
    /// Keys follow the column order. Decimals become numbers; dates and
    /// timestamps become ISO-8601 strings.
    pub fn query_json(&self, sql: &str) -> Result<Vec<JsonObject>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let names: Vec<String> = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = JsonObject::new();
            for (idx, name) in names.iter().enumerate() {
                let value: DbValue = row.get(idx)?;
                object.insert(name.clone(), duckdb_value_to_json(value));
            }
            out.push(object);
        }
        Ok(out)
    }

    /// Write a table, view or parenthesised query to a Parquet file
    pub fn copy_to_parquet(&self, source: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let target = sql_literal(&path.display().to_string());
        self.execute_script(&format!(
            "COPY {source} TO {target} (FORMAT PARQUET, COMPRESSION 'SNAPPY');"
        ))
    }

    /// Close the connection, releasing the file lock
    pub fn close(self) -> Result<()> {
        let location = self.location;
        self.conn
            .close()
            .map_err(|(_, e)| Error::warehouse(format!("Failed to close {location}: {e}")))
    }
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn ensure_identifier(name: &str) -> Result<()> {
    if is_qualified_identifier(name) {
        Ok(())
    } else {
        Err(Error::warehouse(format!("Invalid table name: {name}")))
    }
}

fn split_qualified(table: &str) -> (&str, &str) {
    table.split_once('.').unwrap_or(("main", table))
}

fn timestamp_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn float_to_json(f: f64) -> Value {
    serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Convert a DuckDB value to JSON
pub fn duckdb_value_to_json(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Bool(b),
        DbValue::TinyInt(i) => i.into(),
        DbValue::SmallInt(i) => i.into(),
        DbValue::Int(i) => i.into(),
        DbValue::BigInt(i) => i.into(),
        DbValue::HugeInt(i) => {
            i64::try_from(i).map_or_else(|_| Value::String(i.to_string()), Value::from)
        }
        DbValue::UTinyInt(i) => i.into(),
        DbValue::USmallInt(i) => i.into(),
        DbValue::UInt(i) => i.into(),
        DbValue::UBigInt(i) => i.into(),
        DbValue::Float(f) => float_to_json(f64::from(f)),
        DbValue::Double(f) => float_to_json(f),
        DbValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map_or_else(|_| Value::String(d.to_string()), float_to_json),
        DbValue::Text(s) | DbValue::Enum(s) => Value::String(s),
        DbValue::Blob(b) => Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        DbValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_CE_DAYS)
            .map_or(Value::from(days), |date| {
                Value::String(date.format("%Y-%m-%d").to_string())
            }),
        DbValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(timestamp_micros(unit, v))
            .map_or(Value::from(v), |dt| {
                Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
            }),
        DbValue::Time64(unit, v) => {
            let micros = timestamp_micros(unit, v);
            let secs = micros / 1_000_000;
            Value::String(format!(
                "{:02}:{:02}:{:02}.{:06}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                micros % 1_000_000
            ))
        }
        DbValue::List(items) | DbValue::Array(items) => {
            Value::Array(items.into_iter().map(duckdb_value_to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}
