//! Output module
//!
//! Flat Arrow schema inference from JSON records and Parquet writing, used
//! for the Parquet copy of every Bronze snapshot.

mod schema;
mod writer;

pub use schema::{infer_schema, records_to_batch};
pub use writer::{write_records_to_parquet, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
