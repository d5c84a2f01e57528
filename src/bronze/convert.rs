//! Latest-snapshot Parquet conversion through DuckDB

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::report::ConvertReport;
use crate::error::Result;
use crate::resources::table_name;
use crate::warehouse::{sql_literal, Warehouse};

/// Latest `*.jsonl` snapshot in a resource directory (greatest file name)
pub fn latest_snapshot(resource_dir: &Path) -> Result<Option<PathBuf>> {
    let mut latest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(resource_dir)? {
        let path = entry?.path();
        if !is_jsonl(&path) {
            continue;
        }
        if latest
            .as_ref()
            .map_or(true, |current| path.file_name() > current.file_name())
        {
            latest = Some(path);
        }
    }
    Ok(latest)
}

/// All `*.jsonl` snapshots in a resource directory, oldest first
pub fn snapshots(resource_dir: &Path) -> Result<Vec<PathBuf>> {
    if !resource_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = std::fs::read_dir(resource_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    files.retain(|p| is_jsonl(p));
    files.sort();
    Ok(files)
}

/// Resource directories under the Bronze root, sorted by name
pub fn resource_dirs(bronze_dir: &Path) -> Result<Vec<PathBuf>> {
    if !bronze_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = std::fs::read_dir(bronze_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    dirs.retain(|p| p.is_dir());
    dirs.sort();
    Ok(dirs)
}

/// Convert the latest snapshot of every resource to `<resource>_latest.parquet`
///
/// Resources without snapshots are skipped with a warning. A failing
/// resource is reported and does not stop the others.
pub fn convert_latest(bronze_dir: &Path, warehouse: &Warehouse) -> Result<Vec<ConvertReport>> {
    let mut reports = Vec::new();

    for dir in resource_dirs(bronze_dir)? {
        let resource = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(jsonl) = latest_snapshot(&dir)? else {
            warn!("No JSONL files found for {}", resource);
            continue;
        };
        let parquet = dir.join(format!("{resource}_latest.parquet"));
        info!(
            "Converting {}: {} -> {}",
            resource,
            jsonl.display(),
            parquet.display()
        );

        let report = match convert_one(warehouse, &resource, &jsonl, &parquet) {
            Ok(count) => {
                info!("{}: {} records -> {}", resource, count, parquet.display());
                ConvertReport::converted(resource, count, jsonl, parquet)
            }
            Err(e) => {
                warn!("{}: {}", resource, e);
                ConvertReport::failed(resource, jsonl, e.to_string())
            }
        };
        reports.push(report);
    }

    Ok(reports)
}

fn convert_one(warehouse: &Warehouse, resource: &str, jsonl: &Path, parquet: &Path) -> Result<usize> {
    let temp = format!("temp_{}", table_name(resource));
    warehouse.execute_script(&format!(
        "CREATE OR REPLACE TEMP TABLE {temp} AS SELECT * FROM read_json_auto({});",
        sql_literal(&jsonl.display().to_string())
    ))?;
    let count = warehouse.count(&temp)?;
    warehouse.copy_to_parquet(&temp, parquet)?;
    warehouse.execute_script(&format!("DROP TABLE IF EXISTS {temp};"))?;
    Ok(count)
}

fn is_jsonl(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl")
}
