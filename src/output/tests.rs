//! Tests for output module

use super::*;
use arrow::array::{Array, StringArray};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs::File;
use tempfile::tempdir;

// ============================================================================
// Schema Inference Tests
// ============================================================================

#[test]
fn test_infer_schema_empty() {
    let schema = infer_schema(&[]);
    assert!(schema.fields().is_empty());
}

#[test]
fn test_infer_schema_keeps_first_seen_order() {
    let records = vec![
        json!({"code": "1000", "name": "Sales"}),
        json!({"code": "2000", "isActive": true, "name": "Rent"}),
    ];

    let schema = infer_schema(&records);
    let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["code", "name", "isActive"]);
    assert_eq!(
        schema.field_with_name("isActive").unwrap().data_type(),
        &DataType::Boolean
    );
}

#[test]
fn test_infer_schema_type_merging() {
    let records = vec![
        json!({"amount": 10, "ref": null, "mixed": 1}),
        json!({"amount": 12.5, "ref": "INV-1", "mixed": "one"}),
    ];

    let schema = infer_schema(&records);
    assert_eq!(
        schema.field_with_name("amount").unwrap().data_type(),
        &DataType::Float64
    );
    assert_eq!(
        schema.field_with_name("ref").unwrap().data_type(),
        &DataType::Utf8
    );
    assert_eq!(
        schema.field_with_name("mixed").unwrap().data_type(),
        &DataType::Utf8
    );
}

#[test]
fn test_nested_values_become_json_text() {
    let records = vec![json!({
        "id": "inv-1",
        "lines": [{"description": "Consulting", "quantity": 2}],
        "customer": {"id": "c1"}
    })];

    let batch = records_to_batch(&records, None).unwrap();
    let lines = batch
        .column_by_name("lines")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let parsed: Value = serde_json::from_str(lines.value(0)).unwrap();
    assert_eq!(parsed[0]["description"], "Consulting");
}

#[test]
fn test_records_to_batch_nulls_and_missing() {
    let records = vec![json!({"id": 1, "note": "a"}), json!({"id": 2})];

    let batch = records_to_batch(&records, None).unwrap();
    assert_eq!(batch.num_rows(), 2);
    let note = batch.column_by_name("note").unwrap();
    assert!(!note.is_null(0));
    assert!(note.is_null(1));
}

#[test]
fn test_records_to_batch_empty() {
    let batch = records_to_batch(&[], None).unwrap();
    assert_eq!(batch.num_rows(), 0);
}

// ============================================================================
// Parquet Writer Tests
// ============================================================================

#[test]
fn test_parquet_writer_config() {
    assert_eq!(ParquetWriterConfig::default().compression(), Compression::SNAPPY);
    assert_eq!(
        ParquetWriterConfig::new().uncompressed().compression(),
        Compression::UNCOMPRESSED
    );
    assert!(matches!(
        ParquetWriterConfig::new().zstd().compression(),
        Compression::ZSTD(_)
    ));
}

#[test]
fn test_write_records_to_parquet_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/dir/customers.parquet");
    let records = vec![
        json!({"id": "c1", "name": "Acme", "_source_": "payday"}),
        json!({"id": "c2", "name": "Globex", "_source_": "payday"}),
    ];

    let rows = write_records_to_parquet(&path, &records, &ParquetWriterConfig::default()).unwrap();
    assert_eq!(rows, 2);

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(total, 2);
}

#[test]
fn test_write_records_to_parquet_empty_is_error() {
    let dir = tempdir().unwrap();
    let err = write_records_to_parquet(
        dir.path().join("empty.parquet"),
        &[],
        &ParquetWriterConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("No records"));
}

#[test]
fn test_parquet_writer_multiple_batches() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi.parquet");
    let first = records_to_batch(&[json!({"id": 1})], None).unwrap();
    let second = records_to_batch(&[json!({"id": 2}), json!({"id": 3})], None).unwrap();

    let mut writer =
        ParquetWriter::create(&path, &first, &ParquetWriterConfig::new().with_row_group_size(1))
            .unwrap();
    writer.write(&first).unwrap();
    writer.write(&second).unwrap();
    assert_eq!(writer.close().unwrap(), 3);
}
