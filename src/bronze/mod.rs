//! Bronze layer
//!
//! Raw, append-only JSONL snapshots per resource plus helpers to locate and
//! convert them.

mod convert;
mod report;
mod writer;

pub use convert::{convert_latest, latest_snapshot, resource_dirs, snapshots};
pub use report::{ConvertReport, FetchReport, RunSummary, Status};
pub use writer::{
    snapshot_id, to_ascii_json, write_ascii_json, BronzeWriter, WrittenSnapshot, INGESTED_AT,
    RESOURCE, SOURCE,
};
