//! Catalog integration tests: table lifecycle, loading, views and copies

mod test_utils;

use std::fs;

use serde_json::json;

use bqlite::catalog::{
    schema_from_json, Catalog, CatalogError, CreateDisposition, DataType, Field, Mode, Value,
    WriteDisposition,
};
use bqlite::sql::SqlError;
use bqlite::Error;

use test_utils::{query, s, test_catalog};

fn scores() -> Vec<Field> {
    vec![
        Field::new("name", DataType::String).required(),
        Field::new("score", DataType::Float),
        Field::new("ok", DataType::Boolean),
        Field::new("at", DataType::Timestamp),
    ]
}

// ============ Lifecycle Tests ============

#[test]
fn test_table_lifecycle() {
    let mut catalog = Catalog::new();
    catalog.create_table("b", &scores()).unwrap();
    catalog.create_table("a", &scores()).unwrap();
    assert_eq!(catalog.table_names(), vec!["a", "b"]);

    assert!(matches!(
        catalog.create_table("a", &scores()),
        Err(CatalogError::TableExists(_))
    ));

    catalog.delete_table("a").unwrap();
    assert!(!catalog.exists("a"));
    assert!(matches!(catalog.delete_table("a"), Err(CatalogError::NotFound(_))));
    assert!(matches!(
        bqlite::run_query("SELECT name FROM a", &catalog),
        Err(Error::Sql(SqlError::UnknownTable(_)))
    ));
}

#[test]
fn test_invalid_schemas_rejected() {
    let mut catalog = Catalog::new();
    assert!(matches!(
        catalog.create_table(
            "t",
            &[Field::new("x", DataType::Integer), Field::new("x", DataType::String)]
        ),
        Err(CatalogError::InvalidSchema(_))
    ));
    assert!(matches!(
        catalog.create_table("t", &[Field::record("r", vec![])]),
        Err(CatalogError::InvalidSchema(_))
    ));
    assert!(!catalog.exists("t"));
}

// ============ Loading Tests ============

#[test]
fn test_load_rows_coerces_values() {
    let mut catalog = Catalog::new();
    catalog.create_table("s", &scores()).unwrap();
    let loaded = catalog
        .load_rows(
            "s",
            &[
                json!({"name": "a", "score": 3, "ok": "true", "at": "2016-01-01 00:00:00"}),
                json!(["b", "1.5", false, null]),
            ],
        )
        .unwrap();
    assert_eq!(loaded, 2);

    let result = query(&catalog, "SELECT * FROM s");
    assert_eq!(
        result.rows(),
        &[
            vec![
                s("a"),
                Value::Float(3.0),
                Value::Boolean(true),
                Value::Timestamp(1_451_606_400_000_000),
            ],
            vec![s("b"), Value::Float(1.5), Value::Boolean(false), Value::Null],
        ]
    );
}

#[test]
fn test_load_failure_leaves_table_unchanged() {
    let mut catalog = Catalog::new();
    catalog.create_table("s", &scores()).unwrap();
    catalog.load_rows("s", &[json!({"name": "first"})]).unwrap();

    let err = catalog
        .load_rows(
            "s",
            &[json!({"name": "ok", "score": 1.0}), json!({"name": null})],
        )
        .unwrap_err();
    match err {
        CatalogError::SchemaMismatch { row, column, .. } => {
            assert_eq!(row, 1);
            assert_eq!(column.as_deref(), Some("name"));
        }
        other => panic!("expected schema mismatch, got {:?}", other),
    }
    assert_eq!(catalog.get_table("s").unwrap().num_rows(), 1);

    assert!(matches!(
        catalog.load_rows("s", &[json!({"name": "x", "score": "high"})]),
        Err(CatalogError::SchemaMismatch { .. })
    ));
    assert!(matches!(
        catalog.load_rows("s", &[json!(["too", "short"])]),
        Err(CatalogError::SchemaMismatch { column: None, .. })
    ));
    assert!(matches!(
        catalog.load_rows("missing", &[json!({})]),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn test_load_nested_and_repeated_records() {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "events",
            &[
                Field::new("id", DataType::Integer),
                Field::record(
                    "hits",
                    vec![
                        Field::new("page", DataType::String),
                        Field::new("ms", DataType::Integer),
                    ],
                )
                .repeated(),
            ],
        )
        .unwrap();
    catalog
        .load_rows(
            "events",
            &[json!({"id": 1, "hits": [{"page": "/", "ms": 5}, {"page": "/a", "ms": 7}]})],
        )
        .unwrap();

    let table = catalog.get_table("events").unwrap();
    assert_eq!(table.schema().names(), vec!["id", "hits.page", "hits.ms"]);
    assert_eq!(table.schema().columns()[1].mode, Mode::Repeated);

    let result = query(&catalog, "SELECT SUM(hits.ms) AS total FROM events");
    assert_eq!(result.rows(), &[vec![Value::Integer(12)]]);
}

#[test]
fn test_append_values_checks_types() {
    let mut catalog = Catalog::new();
    catalog.create_table("s", &scores()).unwrap();
    catalog
        .append_values(
            "s",
            vec![vec![s("a"), Value::Integer(2), Value::Null, Value::Null]],
        )
        .unwrap();
    assert_eq!(
        catalog.get_table("s").unwrap().row(0),
        Some(vec![s("a"), Value::Float(2.0), Value::Null, Value::Null])
    );

    assert!(matches!(
        catalog.append_values(
            "s",
            vec![vec![Value::Integer(1), Value::Null, Value::Null, Value::Null]]
        ),
        Err(CatalogError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    let rows_path = dir.path().join("rows.ndjson");
    fs::write(
        &schema_path,
        r#"{"fields": [
            {"name": "k", "type": "STRING", "mode": "REQUIRED"},
            {"name": "v", "type": "INTEGER"}
        ]}"#,
    )
    .unwrap();
    fs::write(&rows_path, "{\"k\": \"a\", \"v\": 1}\n\n{\"k\": \"b\"}\n").unwrap();

    let fields = schema_from_json(&fs::read_to_string(&schema_path).unwrap()).unwrap();
    let mut catalog = Catalog::new();
    catalog.create_table("kv", &fields).unwrap();
    let loaded = catalog
        .load_ndjson("kv", &fs::read_to_string(&rows_path).unwrap())
        .unwrap();
    assert_eq!(loaded, 2);

    let result = query(&catalog, "SELECT k, v FROM kv ORDER BY k DESC");
    assert_eq!(
        result.rows(),
        &[vec![s("b"), Value::Null], vec![s("a"), Value::Integer(1)]]
    );
}

#[test]
fn test_schema_from_json_forms() {
    let bare = schema_from_json(r#"[{"name": "x", "type": "FLOAT", "mode": "REPEATED"}]"#).unwrap();
    assert_eq!(bare.len(), 1);
    assert_eq!(bare[0].data_type, DataType::Float);
    assert_eq!(bare[0].mode, Mode::Repeated);

    assert!(matches!(
        schema_from_json("not json"),
        Err(CatalogError::InvalidSchema(_))
    ));
}

// ============ View Tests ============

#[test]
fn test_view_lifecycle() {
    let mut catalog = test_catalog();
    catalog
        .create_view("big_orders", "SELECT id, total FROM orders WHERE total > 5")
        .unwrap();
    assert!(catalog.exists("big_orders"));
    assert!(matches!(
        catalog.create_view("big_orders", "SELECT 1"),
        Err(Error::Catalog(CatalogError::TableExists(_)))
    ));

    catalog
        .create_view("top_order", "SELECT MAX(total) AS top FROM big_orders")
        .unwrap();
    let result = query(&catalog, "SELECT top FROM top_order");
    assert_eq!(result.rows(), &[vec![Value::Float(20.0)]]);

    catalog.delete_table("big_orders").unwrap();
    assert!(matches!(
        bqlite::run_query("SELECT top FROM top_order", &catalog),
        Err(Error::Sql(SqlError::UnknownTable(_)))
    ));
}

#[test]
fn test_view_must_resolve() {
    let mut catalog = test_catalog();
    assert!(matches!(
        catalog.create_view("v", "SELECT nope FROM users"),
        Err(Error::Sql(SqlError::UnknownColumn(_)))
    ));
    assert!(matches!(
        catalog.create_view("v", "SELECT FROM"),
        Err(Error::Parse(_))
    ));
    assert!(!catalog.exists("v"));
}

// ============ Copy Tests ============

#[test]
fn test_copy_table_dispositions() {
    let mut catalog = test_catalog();

    let copied = catalog
        .copy_table(
            "orders",
            "orders_copy",
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteEmpty,
        )
        .unwrap();
    assert_eq!(copied, 4);
    assert_eq!(
        query(&catalog, "SELECT * FROM orders_copy").into_rows(),
        query(&catalog, "SELECT * FROM orders").into_rows()
    );
    let copy = catalog.get_table("orders_copy").unwrap();
    assert_eq!(copy.schema().columns()[0].mode, Mode::Nullable);

    assert!(matches!(
        catalog.copy_table(
            "orders",
            "orders_copy",
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteEmpty,
        ),
        Err(CatalogError::TableNotEmpty(_))
    ));

    catalog
        .copy_table(
            "orders",
            "orders_copy",
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteAppend,
        )
        .unwrap();
    assert_eq!(catalog.get_table("orders_copy").unwrap().num_rows(), 8);

    catalog
        .copy_table(
            "orders",
            "orders_copy",
            CreateDisposition::CreateNever,
            WriteDisposition::WriteTruncate,
        )
        .unwrap();
    assert_eq!(catalog.get_table("orders_copy").unwrap().num_rows(), 4);

    assert!(matches!(
        catalog.copy_table(
            "orders",
            "nowhere",
            CreateDisposition::CreateNever,
            WriteDisposition::WriteAppend,
        ),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn test_store_query_result() {
    let mut catalog = test_catalog();
    let result = query(
        &catalog,
        "SELECT user_id, SUM(total) AS spent FROM orders GROUP BY user_id",
    );
    let stored = catalog
        .store_result(
            &result,
            "spend",
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteTruncate,
        )
        .unwrap();
    assert_eq!(stored, 3);

    let top = query(&catalog, "SELECT user_id FROM spend ORDER BY spent DESC LIMIT 1");
    assert_eq!(top.rows(), &[vec![Value::Integer(1)]]);
}

#[test]
fn test_shared_catalog_across_threads() {
    let shared = test_catalog().into_shared();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = shared.clone();
            std::thread::spawn(move || {
                let catalog = catalog.read();
                query(&catalog, "SELECT COUNT(*) FROM orders").into_rows()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec![vec![Value::Integer(4)]]);
    }

    shared.write().delete_table("orders").unwrap();
    assert!(!shared.read().exists("orders"));
}
