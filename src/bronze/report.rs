//! Fetch and conversion reports

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome marker printed in summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Records were produced
    Ok,
    /// The resource failed
    Err,
    /// Nothing failed but nothing was produced
    Warn,
}

impl Status {
    /// `Ok` when count > 0, else `Err` when there is an error, else `Warn`
    pub fn of(count: usize, error: Option<&str>) -> Self {
        if count > 0 {
            Status::Ok
        } else if error.is_some() {
            Status::Err
        } else {
            Status::Warn
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::Err => "ERR",
            Status::Warn => "WARN",
        })
    }
}

/// Result of fetching one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Resource name
    pub resource: String,
    /// Records written
    pub count: usize,
    /// JSONL snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonl: Option<PathBuf>,
    /// Parquet copy of the snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parquet: Option<PathBuf>,
    /// Pages that returned a response
    pub pages_fetched: u32,
    /// Route or bridge tool used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchReport {
    /// Report for a resource that failed
    pub fn failed(resource: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Summary marker for this report
    pub fn status(&self) -> Status {
        Status::of(self.count, self.error.as_deref())
    }
}

/// Result of converting one resource's latest snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertReport {
    /// Resource name
    pub resource: String,
    /// Rows converted
    pub count: usize,
    /// Source snapshot
    pub jsonl: PathBuf,
    /// Written Parquet file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parquet: Option<PathBuf>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConvertReport {
    pub(crate) fn converted(resource: String, count: usize, jsonl: PathBuf, parquet: PathBuf) -> Self {
        Self {
            resource,
            count,
            jsonl,
            parquet: Some(parquet),
            error: None,
        }
    }

    pub(crate) fn failed(resource: String, jsonl: PathBuf, error: String) -> Self {
        Self {
            resource,
            count: 0,
            jsonl,
            parquet: None,
            error: Some(error),
        }
    }

    /// Summary marker for this report
    pub fn status(&self) -> Status {
        Status::of(self.count, self.error.as_deref())
    }
}

/// Totals for a fetch run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Snapshot id shared by the run
    pub snapshot: String,
    /// Bronze root the run wrote to
    pub location: PathBuf,
    /// Records across all resources
    pub total_records: usize,
    /// Per-resource reports in fetch order
    pub resources: Vec<FetchReport>,
}

impl RunSummary {
    /// Build a summary from per-resource reports
    pub fn new(snapshot: impl Into<String>, location: impl Into<PathBuf>, resources: Vec<FetchReport>) -> Self {
        let total_records = resources.iter().map(|r| r.count).sum();
        Self {
            snapshot: snapshot.into(),
            location: location.into(),
            total_records,
            resources,
        }
    }

    /// Resources that failed
    pub fn failures(&self) -> impl Iterator<Item = &FetchReport> {
        self.resources.iter().filter(|r| r.error.is_some())
    }

    /// Log one line per resource plus the totals
    pub fn log(&self) {
        for report in &self.resources {
            match &report.error {
                Some(error) => warn!(
                    "[{}] {}: {} records ({})",
                    report.status(),
                    report.resource,
                    report.count,
                    error
                ),
                None => info!(
                    "[{}] {}: {} records",
                    report.status(),
                    report.resource,
                    report.count
                ),
            }
        }
        info!(
            "Total records fetched: {} (snapshot {}, {})",
            self.total_records,
            self.snapshot,
            self.location.display()
        );
    }
}
