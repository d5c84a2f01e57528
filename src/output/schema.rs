//! Arrow schema inference for Bronze records
//!
//! Payday records are flat objects with the odd nested field (address
//! blocks, invoice lines). Scalars map to Arrow primitives; nested values
//! are kept as their JSON text so a snapshot always fits one flat schema.

use crate::error::{Error, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Infer a flat Arrow schema from JSON records
///
/// Columns appear in first-seen order. Every column is nullable.
pub fn infer_schema(records: &[Value]) -> Schema {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();

    for record in records {
        let Value::Object(obj) = record else {
            continue;
        };
        for (key, value) in obj {
            let seen = scalar_type(value);
            match types.get_mut(key) {
                Some(existing) => *existing = merge_types(existing, &seen),
                None => {
                    order.push(key.clone());
                    types.insert(key.clone(), seen);
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let dtype = types.remove(&name).unwrap_or(DataType::Null);
            Field::new(name, dtype, true)
        })
        .collect();

    Schema::new(fields)
}

/// Convert JSON records to a RecordBatch
///
/// Infers the schema when none is given. Non-object records contribute a
/// row of nulls.
pub fn records_to_batch(records: &[Value], schema: Option<&Schema>) -> Result<RecordBatch> {
    let schema = match schema {
        Some(s) => s.clone(),
        None => infer_schema(records),
    };
    let schema = Arc::new(schema);

    if records.is_empty() || schema.fields().is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let cells: Vec<Option<&Value>> = records
                .iter()
                .map(|r| r.get(field.name()).filter(|v| !v.is_null()))
                .collect();
            build_column(&cells, field.data_type())
        })
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(schema, columns)
        .map_err(|e| Error::output(format!("Failed to create RecordBatch: {e}")))
}

fn scalar_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) if n.is_i64() => DataType::Int64,
        Value::Number(_) => DataType::Float64,
        Value::String(_) | Value::Array(_) | Value::Object(_) => DataType::Utf8,
    }
}

fn merge_types(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

fn build_column(cells: &[Option<&Value>], dtype: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match dtype {
        DataType::Null => Arc::new(NullArray::new(cells.len())),
        DataType::Boolean => Arc::new(
            cells
                .iter()
                .map(|v| v.and_then(Value::as_bool))
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            cells
                .iter()
                .map(|v| v.and_then(Value::as_i64))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            cells
                .iter()
                .map(|v| v.and_then(Value::as_f64))
                .collect::<Float64Array>(),
        ),
        DataType::Utf8 => Arc::new(
            cells
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect::<StringArray>(),
        ),
        other => {
            return Err(Error::output(format!("Unsupported column type {other}")));
        }
    };
    Ok(array)
}
