use catalog::{ColumnDef, TableSchema};
use common::{Config, DbError, RowId};
use database::Database;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use storage::{Pager, DB_MAGIC, HEADER_SIZE};
use tempfile::tempdir;
use types::{SqlType, Value};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open(path: &Path) -> Database {
    init_logging();
    Database::open(path, &Config::default()).unwrap()
}

fn accounts_schema() -> TableSchema {
    TableSchema::try_new(
        "accounts",
        vec![
            ColumnDef::new("id", SqlType::Int).with_primary_key(),
            ColumnDef::text("owner", 24),
            ColumnDef::new("balance", SqlType::Float),
        ],
    )
    .unwrap()
}

#[test]
fn fresh_database_has_an_empty_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    let db = open(&path);
    db.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(&bytes[..4], &DB_MAGIC.to_le_bytes());

    let pager = Pager::open(&path).unwrap();
    assert_eq!(pager.page_count(), 1);
    assert_eq!(pager.index_root(), None);
    assert_eq!(pager.schema_page(), None);
}

#[test]
fn single_key_round_trip_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let mut db = open(&path);
        db.create_table(accounts_schema()).unwrap();
        let rid = db
            .insert(
                "accounts",
                &[
                    Value::Int(42),
                    Value::Text("ada".into()),
                    Value::Float(12.5),
                ],
            )
            .unwrap();
        assert_eq!(rid, RowId(1));
        db.close().unwrap();
    }

    let mut db = open(&path);
    let row = db
        .find_by_pk("accounts", &Value::Int(42))
        .unwrap()
        .expect("row survives reopen");
    assert_eq!(
        row.values,
        vec![
            Value::Int(42),
            Value::Text("ada".into()),
            Value::Float(12.5),
        ]
    );
    db.close().unwrap();
}

#[test]
fn duplicate_primary_key_rejected_end_to_end() {
    let dir = tempdir().unwrap();
    let mut db = open(&dir.path().join("db"));
    db.create_table(accounts_schema()).unwrap();

    db.insert(
        "accounts",
        &[Value::Int(1), Value::Text("a".into()), Value::Float(0.0)],
    )
    .unwrap();
    let err = db
        .insert(
            "accounts",
            &[Value::Int(1), Value::Text("b".into()), Value::Float(9.9)],
        )
        .unwrap_err();
    assert!(matches!(err, DbError::Constraint(_)));

    let row = db.find_by_pk("accounts", &Value::Int(1)).unwrap().unwrap();
    assert_eq!(row.values[1], Value::Text("a".into()));
}

#[test]
fn scans_skip_deleted_rows() {
    let dir = tempdir().unwrap();
    let mut db = open(&dir.path().join("db"));
    db.create_table(accounts_schema()).unwrap();

    for i in 1..=5 {
        db.insert(
            "accounts",
            &[
                Value::Int(i),
                Value::Text(format!("u{i}")),
                Value::Float(i as f32),
            ],
        )
        .unwrap();
    }
    assert!(db.delete_by_pk("accounts", &Value::Int(3)).unwrap());

    let rows = db.scan("accounts").unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.values[0] != Value::Int(3)));
    assert!(db.find_by_pk("accounts", &Value::Int(3)).unwrap().is_none());
}

#[test]
fn catalog_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let mut db = open(&path);
        db.create_table(accounts_schema()).unwrap();
        db.create_table(
            TableSchema::try_new("tags", vec![ColumnDef::text("tag", 8)]).unwrap(),
        )
        .unwrap();
        db.close().unwrap();
    }

    let db = open(&path);
    assert_eq!(db.catalog().tables().count(), 2);
    assert_eq!(*db.catalog().table("accounts").unwrap(), accounts_schema());
}

#[test]
fn unknown_table_is_a_catalog_error() {
    let dir = tempdir().unwrap();
    let mut db = open(&dir.path().join("db"));
    let err = db.scan("ghost").unwrap_err();
    assert!(matches!(err, DbError::Catalog(_)));
}

#[test]
fn close_reopen_is_byte_stable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let mut db = open(&path);
        db.create_table(accounts_schema()).unwrap();
        for i in 0..50 {
            db.insert(
                "accounts",
                &[
                    Value::Int(i),
                    Value::Text("x".into()),
                    Value::Float(0.0),
                ],
            )
            .unwrap();
        }
        db.close().unwrap();
    }

    let before = fs::read(&path).unwrap();

    // Opening and closing without mutating must not change a byte.
    let db = open(&path);
    db.close().unwrap();
    let after = fs::read(&path).unwrap();
    assert_eq!(before, after);
}

#[test]
fn small_cache_still_serves_many_pages() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    let mut db = Database::open(&path, &Config::builder().cache_pages(2).build()).unwrap();
    db.create_table(
        TableSchema::try_new(
            "wide",
            vec![
                ColumnDef::new("id", SqlType::Int).with_primary_key(),
                ColumnDef::text("pad", 255),
            ],
        )
        .unwrap(),
    )
    .unwrap();

    // Far more pages than the cache holds: data chain + index nodes.
    for i in 0..120 {
        db.insert("wide", &[Value::Int(i), Value::Text("p".into())])
            .unwrap();
    }
    for i in 0..120 {
        let row = db.find_by_pk("wide", &Value::Int(i)).unwrap().unwrap();
        assert_eq!(row.values[0], Value::Int(i));
    }
    db.close().unwrap();

    let mut db = Database::open(&path, &Config::default()).unwrap();
    assert_eq!(db.scan("wide").unwrap().len(), 120);
}
