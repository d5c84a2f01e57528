//! Bronze fixtures shared by unit tests

use serde_json::{json, Value};
use std::path::Path;

/// Write a snapshot file with fixed ingestion metadata
pub(crate) fn write_jsonl(
    bronze: &Path,
    resource: &str,
    snapshot: &str,
    ingested: &str,
    records: &[Value],
) {
    let dir = bronze.join(resource);
    std::fs::create_dir_all(&dir).unwrap();
    let lines: Vec<String> = records
        .iter()
        .map(|r| {
            let mut r = r.clone();
            r["_ingested_at_utc"] = json!(ingested);
            r["_source_"] = json!("payday");
            r["_resource_"] = json!(resource);
            r.to_string()
        })
        .collect();
    std::fs::write(
        dir.join(format!("snapshot_{snapshot}.jsonl")),
        lines.join("\n") + "\n",
    )
    .unwrap();
}

/// Accounts plus an account statement spread over two snapshots
pub(crate) fn seed_bronze(bronze: &Path) {
    write_jsonl(
        bronze,
        "accounts",
        "20240301_000000",
        "2024-03-01T00:00:00+00:00",
        &[
            json!({"id": "a1", "code": "1000", "name": "Sales", "type": "Income"}),
            json!({"id": "a2", "code": "2000", "name": "Goods", "type": "Expense"}),
            json!({"id": "a3", "code": "7600", "name": "Bank", "type": "Asset", "isActive": false}),
        ],
    );
    write_jsonl(
        bronze,
        "account-statement",
        "20240301_000000",
        "2024-03-01T00:00:00+00:00",
        &[
            json!({"id": "t1", "date": "2024-01-15", "accountCode": "1000", "debit": 0, "credit": 1000}),
            json!({"id": "t2", "date": "2024-01-20", "accountCode": "2000", "debit": 400, "credit": 0}),
            json!({"id": "t3", "date": "2024-02-03", "accountCode": "7600", "amount": 600}),
            json!({"id": "t4", "date": "2024-02-05", "accountCode": "9999", "accountName": "Ghost", "debit": 5}),
            json!({"id": "t5", "accountCode": "1000", "credit": 10}),
        ],
    );
    write_jsonl(
        bronze,
        "account-statement",
        "20240302_000000",
        "2024-03-02T00:00:00+00:00",
        &[json!({"id": "t1", "date": "2024-01-15", "accountCode": "1000", "debit": 0, "credit": 1200})],
    );
}

