//! Shared test utilities
//!
//! Note: clippy reports false-positive dead_code warnings because it can't
//! trace usage across test binaries. These utilities are used by multiple tests.

#![allow(dead_code)]

use serde_json::json;

use bqlite::catalog::{Catalog, DataType, Field, Value};
use bqlite::ResultTable;

/// Catalog with `users` (nested record, repeated tags) and `orders`
pub fn test_catalog() -> Catalog {
    let mut catalog = Catalog::new();

    catalog
        .create_table(
            "users",
            &[
                Field::new("id", DataType::Integer).required(),
                Field::new("name", DataType::String),
                Field::new("age", DataType::Integer),
                Field::new("tags", DataType::String).repeated(),
                Field::record(
                    "address",
                    vec![
                        Field::new("city", DataType::String),
                        Field::new("zip", DataType::String),
                    ],
                ),
            ],
        )
        .unwrap();
    catalog
        .load_rows(
            "users",
            &[
                json!({"id": 1, "name": "alice", "age": 30, "tags": ["a", "b"],
                       "address": {"city": "Paris", "zip": "75001"}}),
                json!({"id": 2, "name": "bob", "age": null, "tags": [],
                       "address": {"city": "Berlin"}}),
                json!({"id": 3, "name": "carol", "age": 25, "tags": ["b"]}),
            ],
        )
        .unwrap();

    catalog
        .create_table(
            "orders",
            &[
                Field::new("id", DataType::Integer).required(),
                Field::new("user_id", DataType::Integer),
                Field::new("total", DataType::Float),
            ],
        )
        .unwrap();
    catalog
        .load_ndjson(
            "orders",
            r#"{"id": 10, "user_id": 1, "total": 9.5}
{"id": 11, "user_id": 1, "total": 20.0}
{"id": 12, "user_id": 2, "total": 5.25}
{"id": 13, "user_id": 4, "total": 1.0}"#,
        )
        .unwrap();

    catalog
}

/// Catalog holding one nullable INTEGER column `x` in table `name`
pub fn int_table(name: &str, values: &[Option<i64>]) -> Catalog {
    let mut catalog = Catalog::new();
    add_int_table(&mut catalog, name, "x", values);
    catalog
}

/// Add a one-column INTEGER table to an existing catalog
pub fn add_int_table(catalog: &mut Catalog, name: &str, column: &str, values: &[Option<i64>]) {
    catalog
        .create_table(name, &[Field::new(column, DataType::Integer)])
        .unwrap();
    catalog
        .append_values(name, values.iter().map(|v| vec![int(*v)]).collect())
        .unwrap();
}

/// Run a query that is expected to succeed
pub fn query(catalog: &Catalog, sql: &str) -> ResultTable {
    match bqlite::run_query(sql, catalog) {
        Ok(result) => result,
        Err(e) => panic!("query failed: {}\n  {}", e, sql),
    }
}

pub fn int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

pub fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

pub fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|item| s(item)).collect())
}
