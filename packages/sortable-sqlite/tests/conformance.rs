use rusqlite::Connection;
use tempfile::NamedTempFile;

use sortable_core::{Error, OrderMaintainer, SortableConfig, TableSpec};
use sortable_sqlite::SqliteStore;

const SCHEMA: &str = "CREATE TABLE items (
    id INTEGER PRIMARY KEY,
    order_column INTEGER NOT NULL,
    list_id INTEGER,
    slug TEXT,
    deleted_at TEXT
);
CREATE INDEX idx_items_list_order ON items (list_id, order_column);";

fn table() -> TableSpec {
    TableSpec::new("items", &SortableConfig::default()).with_soft_deletes("deleted_at")
}

fn in_memory() -> SqliteStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    SqliteStore::new(conn, table()).unwrap()
}

#[test]
fn sqlite_in_memory_conformance() {
    sortable_test_support::run_all(in_memory);
}

#[test]
fn sqlite_file_conformance() {
    // Keep every temp file alive until the suite finishes.
    let mut files = Vec::new();
    sortable_test_support::run_all(|| {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(file.path().to_str().unwrap(), table()).unwrap();
        store.connection().execute_batch(SCHEMA).unwrap();
        files.push(file);
        store
    });
}

#[test]
fn positions_survive_reopen() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    {
        let store = SqliteStore::open(&path, table()).unwrap();
        store.connection().execute_batch(SCHEMA).unwrap();
        let config = SortableConfig::default();
        let mut m = OrderMaintainer::new(store, config).unwrap();
        sortable_test_support::seed(&mut m, 1, 3);
        let mut c = sortable_test_support::fetch(&m, 103);
        m.move_to_start(&mut c, &sortable_test_support::list(1)).unwrap();
    }
    let store = SqliteStore::open(&path, table()).unwrap();
    let config = SortableConfig::default();
    let m = OrderMaintainer::new(store, config).unwrap();
    assert_eq!(
        sortable_test_support::layout(&m, 1),
        vec![(103, 1), (101, 2), (102, 3)]
    );
}

#[test]
fn custom_order_column_name() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (task_id INTEGER PRIMARY KEY, rank INTEGER NOT NULL, list_id INTEGER, slug TEXT);",
    )
    .unwrap();
    let config = SortableConfig::default().with_order_column("rank");
    let table = TableSpec::new("tasks", &config).with_key_column("task_id");
    let store = SqliteStore::new(conn, table).unwrap();
    let mut m = OrderMaintainer::new(store, config).unwrap();
    sortable_test_support::seed(&mut m, 1, 3);
    let mut a = sortable_test_support::fetch(&m, 101);
    m.move_to_end(&mut a, &sortable_test_support::list(1)).unwrap();
    let rank: i64 = m
        .store()
        .connection()
        .query_row("SELECT rank FROM tasks WHERE task_id = 101", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rank, 3);
}

#[test]
fn maintainer_rejects_config_naming_another_order_column() {
    let conn = Connection::open_in_memory().unwrap();
    let table = TableSpec::new("items", &SortableConfig::default());
    let store = SqliteStore::new(conn, table).unwrap();
    let config = SortableConfig::default().with_order_column("rank");
    assert!(matches!(
        OrderMaintainer::new(store, config),
        Err(Error::InvalidInput(_))
    ));
}
