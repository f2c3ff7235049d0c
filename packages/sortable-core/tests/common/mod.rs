#![allow(dead_code)]

use sortable_core::{
    Direction, Entry, MemoryStore, NewRecord, OrderMaintainer, OrderStore, Position, RecordId,
    Scope, SortableConfig,
};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sortable_core=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

/// Records keyed `1..=n` at positions `1..=n` in one scope.
pub fn maintainer(n: i64) -> OrderMaintainer<MemoryStore> {
    let config = SortableConfig::default();
    let mut m = OrderMaintainer::new(MemoryStore::new(), config).unwrap();
    for key in 1..=n {
        m.create(NewRecord::new(key), &Scope::all()).unwrap();
    }
    m
}

pub fn entry(m: &OrderMaintainer<MemoryStore>, key: i64) -> Entry {
    m.store().find(RecordId(key)).unwrap().unwrap()
}

pub fn keys_in_order(m: &OrderMaintainer<MemoryStore>) -> Vec<i64> {
    m.ordered(&Scope::all(), Direction::Asc)
        .unwrap()
        .into_iter()
        .map(|e| e.key.0)
        .collect()
}

pub fn layout(m: &OrderMaintainer<MemoryStore>) -> Vec<(i64, Position)> {
    m.ordered(&Scope::all(), Direction::Asc)
        .unwrap()
        .into_iter()
        .map(|e| (e.key.0, e.position))
        .collect()
}
