use std::cell::RefCell;
use std::rc::Rc;

use postgres::{Client, NoTls};
use uuid::Uuid;

use sortable_core::{OrderMaintainer, OrderStore, RecordId, SortableConfig, TableSpec};
use sortable_postgres::{ensure_order_column, PgStore};

fn connect() -> Option<Rc<RefCell<Client>>> {
    let url = std::env::var("SORTABLE_POSTGRES_URL").ok()?;
    let client = Client::connect(&url, NoTls).ok()?;
    Some(Rc::new(RefCell::new(client)))
}

/// A session-scoped table with a unique name, so tests never see each other's rows.
fn fresh_store(client: &Rc<RefCell<Client>>) -> PgStore {
    let name = format!("items_{}", Uuid::new_v4().simple());
    client
        .borrow_mut()
        .batch_execute(&format!(
            "CREATE TEMP TABLE {name} (
                id BIGINT PRIMARY KEY,
                list_id BIGINT,
                slug TEXT,
                deleted_at TIMESTAMPTZ
            )"
        ))
        .unwrap();
    let table = TableSpec::new(name, &SortableConfig::default()).with_soft_deletes("deleted_at");
    ensure_order_column(&mut client.borrow_mut(), &table, &["list_id"]).unwrap();
    PgStore::new(client.clone(), table).unwrap()
}

#[test]
fn postgres_backend_conformance() {
    let Some(client) = connect() else {
        return;
    };
    sortable_test_support::run_all(|| fresh_store(&client));
}

#[test]
fn postgres_backend_ensure_order_column_is_idempotent() {
    let Some(client) = connect() else {
        return;
    };
    let store = fresh_store(&client);
    let table = store.table().clone();
    ensure_order_column(&mut client.borrow_mut(), &table, &["list_id"]).unwrap();

    let mut m = OrderMaintainer::new(store, SortableConfig::default()).unwrap();
    sortable_test_support::seed(&mut m, 1, 2);
    assert_eq!(sortable_test_support::layout(&m, 1), vec![(101, 1), (102, 2)]);
}

#[test]
fn postgres_backend_rejects_hostile_scope_column() {
    let Some(client) = connect() else {
        return;
    };
    let store = fresh_store(&client);
    let m = OrderMaintainer::new(store, SortableConfig::default()).unwrap();
    let scope = sortable_core::Scope::all().where_eq("list_id = 1 OR 1", 1);
    assert!(matches!(
        m.highest(&scope),
        Err(sortable_core::Error::InvalidInput(_))
    ));
}

#[test]
fn postgres_backend_reports_narrow_integer_columns() {
    let Some(client) = connect() else {
        return;
    };
    let name = format!("narrow_{}", Uuid::new_v4().simple());
    client
        .borrow_mut()
        .batch_execute(&format!(
            "CREATE TEMP TABLE {name} (id INTEGER PRIMARY KEY, order_column INTEGER NOT NULL);
             INSERT INTO {name} (id, order_column) VALUES (1, 1);"
        ))
        .unwrap();
    let table = TableSpec::new(name, &SortableConfig::default());
    let store = PgStore::new(client.clone(), table).unwrap();
    assert!(matches!(
        store.find(RecordId(1)),
        Err(sortable_core::Error::Storage(_))
    ));
}
