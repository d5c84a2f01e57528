//! Bronze snapshot writer
//!
//! Layout: `<bronze dir>/<resource>/snapshot_<YYYYMMDD_HHMMSS>.jsonl`, with a
//! Parquet copy next to it. Every record carries ingestion metadata.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::output::{write_records_to_parquet, ParquetWriterConfig};

/// Ingestion timestamp column
pub const INGESTED_AT: &str = "_ingested_at_utc";
/// Source tag column
pub const SOURCE: &str = "_source_";
/// Resource name column
pub const RESOURCE: &str = "_resource_";

/// Snapshot identifier for a UTC instant (`YYYYMMDD_HHMMSS`)
pub fn snapshot_id(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Files produced by one snapshot write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSnapshot {
    /// Records written
    pub count: usize,
    /// JSONL file
    pub jsonl: PathBuf,
    /// Parquet copy, if it could be written
    pub parquet: Option<PathBuf>,
}

/// Writes Bronze snapshots for one run
#[derive(Debug, Clone)]
pub struct BronzeWriter {
    root: PathBuf,
    snapshot: String,
    parquet: Option<ParquetWriterConfig>,
}

impl BronzeWriter {
    /// Writer rooted at the Bronze directory, stamped with the current time
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_snapshot(root, snapshot_id(Utc::now()))
    }

    /// Writer using an explicit snapshot id
    pub fn with_snapshot(root: impl Into<PathBuf>, snapshot: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            snapshot: snapshot.into(),
            parquet: Some(ParquetWriterConfig::default()),
        }
    }

    /// Skip the Parquet copy
    #[must_use]
    pub fn without_parquet(mut self) -> Self {
        self.parquet = None;
        self
    }

    /// Snapshot id shared by every resource of this run
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Bronze root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a resource's snapshots
    pub fn resource_dir(&self, resource: &str) -> PathBuf {
        self.root.join(resource)
    }

    /// Write one resource snapshot
    ///
    /// Returns `None` and writes nothing when there are no records.
    pub fn write_snapshot(
        &self,
        resource: &str,
        records: Vec<Value>,
        source_tag: &str,
    ) -> Result<Option<WrittenSnapshot>> {
        if records.is_empty() {
            info!("{}: no records", resource);
            return Ok(None);
        }

        let dir = self.resource_dir(resource);
        std::fs::create_dir_all(&dir)?;
        let jsonl = dir.join(format!("snapshot_{}.jsonl", self.snapshot));

        let ingested_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        let records: Vec<Value> = records
            .into_iter()
            .map(|record| with_metadata(record, &ingested_at, source_tag, resource))
            .collect();

        let file = File::create(&jsonl)
            .map_err(|e| Error::output(format!("Failed to create {}: {e}", jsonl.display())))?;
        let mut out = BufWriter::new(file);
        for record in &records {
            write_ascii_json(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        let parquet = self.parquet.as_ref().and_then(|config| {
            let path = jsonl.with_extension("parquet");
            match write_records_to_parquet(&path, &records, config) {
                Ok(_) => Some(path),
                Err(e) => {
                    warn!("{}: Parquet copy failed: {}", resource, e);
                    None
                }
            }
        });

        let name = jsonl
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("{}: {} rows -> {}", resource, records.len(), name);

        Ok(Some(WrittenSnapshot {
            count: records.len(),
            jsonl,
            parquet,
        }))
    }
}

/// Attach ingestion metadata; non-object records are wrapped as `{"value": ...}`
fn with_metadata(record: Value, ingested_at: &str, source_tag: &str, resource: &str) -> Value {
    let mut object = match record {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    object.insert(INGESTED_AT.into(), Value::String(ingested_at.to_string()));
    object.insert(SOURCE.into(), Value::String(source_tag.to_string()));
    object.insert(RESOURCE.into(), Value::String(resource.to_string()));
    Value::Object(object)
}

/// Serializes strings with every non-ASCII character as a `\uXXXX` escape
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Write a value as single-line, ASCII-only JSON
pub fn write_ascii_json<W: io::Write>(writer: &mut W, value: &Value) -> Result<()> {
    let mut ser = serde_json::Serializer::with_formatter(writer, AsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(())
}

/// Render a value as single-line, ASCII-only JSON
pub fn to_ascii_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    write_ascii_json(&mut buf, value)?;
    String::from_utf8(buf).map_err(|e| Error::output(e.to_string()))
}
