//! Backend conformance scenarios.
//!
//! Every store adapter runs the same scenarios against a fresh store. Stores must expose a table
//! with columns `id`, `order_column`, `list_id` (integer), `slug` (text) and soft deletes enabled.

use sortable_core::{
    Direction, Entry, NewRecord, OrderMaintainer, OrderStore, Position, RecordId, Scope,
    SortableConfig,
};

pub const LIST_COLUMN: &str = "list_id";
pub const SLUG_COLUMN: &str = "slug";

pub fn list(id: i64) -> Scope {
    Scope::all().where_eq(LIST_COLUMN, id)
}

pub fn slug(key: i64) -> String {
    format!("s{key}")
}

/// Create `count` records in `list_id`; keys are `list_id * 100 + i` for `i` in `1..=count`.
pub fn seed<S: OrderStore>(m: &mut OrderMaintainer<S>, list_id: i64, count: i64) -> Vec<Entry> {
    (1..=count)
        .map(|i| {
            let key = list_id * 100 + i;
            m.create(
                NewRecord::new(key)
                    .with_field(LIST_COLUMN, list_id)
                    .with_field(SLUG_COLUMN, slug(key)),
                &list(list_id),
            )
            .unwrap()
        })
        .collect()
}

pub fn fetch<S: OrderStore>(m: &OrderMaintainer<S>, key: i64) -> Entry {
    m.store().find(RecordId(key)).unwrap().unwrap()
}

/// `(key, position)` pairs of a list in ascending order.
pub fn layout<S: OrderStore>(m: &OrderMaintainer<S>, list_id: i64) -> Vec<(i64, Position)> {
    m.ordered(&list(list_id), Direction::Asc)
        .unwrap()
        .into_iter()
        .map(|e| (e.key.0, e.position))
        .collect()
}

fn maintainer<S: OrderStore>(store: S) -> OrderMaintainer<S> {
    OrderMaintainer::new(store, SortableConfig::default()).unwrap()
}

pub fn creates_append_per_scope<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    let first = m
        .create(NewRecord::new(1).with_field(LIST_COLUMN, 1), &list(1))
        .unwrap();
    assert_eq!(first.position, 1);
    seed(&mut m, 2, 3);
    let next = m
        .create(NewRecord::new(2).with_field(LIST_COLUMN, 1), &list(1))
        .unwrap();
    assert_eq!(next.position, 2);
    assert_eq!(layout(&m, 2), vec![(201, 1), (202, 2), (203, 3)]);
    assert_eq!(m.highest(&list(2)).unwrap(), 3);
    assert_eq!(m.lowest(&list(2)).unwrap(), 1);
    assert_eq!(m.highest(&list(9)).unwrap(), 0);
}

pub fn assign_highest_position_persists<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    let mut first = fetch(&m, 101);
    m.assign_highest_position(&mut first, &list(1)).unwrap();
    assert_eq!(first.position, 4);
    assert_eq!(fetch(&m, 101).position, 4);
}

pub fn move_before_shifts_block<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 4);
    seed(&mut m, 2, 4);
    let mut d = fetch(&m, 104);
    let b = fetch(&m, 102);
    assert!(m.move_before(&mut d, &b, &list(1)).unwrap());
    assert_eq!(d.position, 2);
    assert_eq!(layout(&m, 1), vec![(101, 1), (104, 2), (102, 3), (103, 4)]);
    assert_eq!(layout(&m, 2), vec![(201, 1), (202, 2), (203, 3), (204, 4)]);
}

pub fn move_after_then_before_restores_adjacency<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 5);
    let mut r = fetch(&m, 102);
    let t = fetch(&m, 104);
    m.move_after(&mut r, &t, &list(1)).unwrap();
    assert_eq!(
        layout(&m, 1),
        vec![(101, 1), (103, 2), (104, 3), (102, 4), (105, 5)]
    );
    let mut r = fetch(&m, 102);
    let t = fetch(&m, 103);
    m.move_before(&mut r, &t, &list(1)).unwrap();
    assert_eq!(
        layout(&m, 1),
        vec![(101, 1), (102, 2), (103, 3), (104, 4), (105, 5)]
    );
    m.validate(&list(1)).unwrap();
}

pub fn move_up_and_down_swap_neighbours<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    let mut first = fetch(&m, 101);
    assert!(!m.move_up(&mut first, &list(1)).unwrap());
    let mut last = fetch(&m, 103);
    assert!(!m.move_down(&mut last, &list(1)).unwrap());

    let mut middle = fetch(&m, 102);
    assert!(m.move_up(&mut middle, &list(1)).unwrap());
    assert_eq!(layout(&m, 1), vec![(102, 1), (101, 2), (103, 3)]);
    assert!(m.move_down(&mut middle, &list(1)).unwrap());
    assert!(m.move_down(&mut middle, &list(1)).unwrap());
    assert_eq!(layout(&m, 1), vec![(101, 1), (103, 2), (102, 3)]);
}

pub fn swap_twice_restores<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    let mut a = fetch(&m, 101);
    let mut c = fetch(&m, 103);
    m.swap_positions(&mut a, &mut c).unwrap();
    assert_eq!(layout(&m, 1), vec![(103, 1), (102, 2), (101, 3)]);
    m.swap_positions(&mut a, &mut c).unwrap();
    assert_eq!(layout(&m, 1), vec![(101, 1), (102, 2), (103, 3)]);
}

pub fn move_to_end_and_start<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 4);
    let mut b = fetch(&m, 102);
    assert!(m.move_to_end(&mut b, &list(1)).unwrap());
    assert_eq!(layout(&m, 1), vec![(101, 1), (103, 2), (104, 3), (102, 4)]);
    assert!(!m.move_to_end(&mut b, &list(1)).unwrap());
    assert!(m.is_last(&b, &list(1)).unwrap());

    assert!(m.move_to_start(&mut b, &list(1)).unwrap());
    assert_eq!(layout(&m, 1), vec![(102, 1), (101, 2), (103, 3), (104, 4)]);
    assert!(!m.move_to_start(&mut b, &list(1)).unwrap());
    assert!(m.is_first(&b, &list(1)).unwrap());
}

pub fn move_to_position_both_directions<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 5);
    let mut e = fetch(&m, 105);
    assert!(m.move_to_position(&mut e, 2, &list(1)).unwrap());
    assert_eq!(
        layout(&m, 1),
        vec![(101, 1), (105, 2), (102, 3), (103, 4), (104, 5)]
    );
    assert!(m.move_to_position(&mut e, 4, &list(1)).unwrap());
    assert_eq!(
        layout(&m, 1),
        vec![(101, 1), (102, 2), (103, 3), (105, 4), (104, 5)]
    );
    assert!(!m.move_to_position(&mut e, 4, &list(1)).unwrap());
}

pub fn soft_delete_closes_gap<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    m.delete(RecordId(102), &list(1)).unwrap();
    assert_eq!(layout(&m, 1), vec![(101, 1), (103, 2)]);
    assert!(fetch(&m, 102).trashed);
    m.validate(&list(1)).unwrap();
}

pub fn purge_of_trashed_only_renumbers<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 4);
    m.delete(RecordId(101), &list(1)).unwrap();
    assert_eq!(layout(&m, 1), vec![(102, 1), (103, 2), (104, 3)]);
    m.force_delete(RecordId(101), &list(1)).unwrap();
    assert!(m.store().find(RecordId(101)).unwrap().is_none());
    assert_eq!(layout(&m, 1), vec![(102, 1), (103, 2), (104, 3)]);
}

pub fn set_new_order_rewrites_including_trashed<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    m.delete(RecordId(103), &list(1)).unwrap();
    m.set_new_order(&list(1), &[RecordId(103), RecordId(102), RecordId(101)], 1, None)
        .unwrap();
    assert_eq!(fetch(&m, 103).position, 1);
    assert_eq!(layout(&m, 1), vec![(102, 2), (101, 3)]);

    m.set_new_order_by_custom_column(&list(1), SLUG_COLUMN, &[slug(101), slug(102)], 10)
        .unwrap();
    assert_eq!(layout(&m, 1), vec![(101, 10), (102, 11)]);
}

pub fn set_new_order_rejects_bad_column<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 2);
    let err = m
        .set_new_order(&list(1), &[RecordId(101)], 1, Some("id = id; --"))
        .unwrap_err();
    assert!(matches!(err, sortable_core::Error::InvalidInput(_)));
    assert_eq!(layout(&m, 1), vec![(101, 1), (102, 2)]);
}

pub fn atomically_rolls_back<S: OrderStore>(store: S) {
    let mut m = maintainer(store);
    seed(&mut m, 1, 3);
    let result: sortable_core::Result<()> = m.atomically(|m| {
        let mut c = fetch(m, 103);
        m.move_to_start(&mut c, &list(1))?;
        Err(sortable_core::Error::Storage("simulated failure".into()))
    });
    assert!(result.is_err());
    assert_eq!(layout(&m, 1), vec![(101, 1), (102, 2), (103, 3)]);

    m.atomically(|m| {
        let mut c = fetch(m, 103);
        m.move_to_start(&mut c, &list(1))
    })
    .unwrap();
    assert_eq!(layout(&m, 1), vec![(103, 1), (101, 2), (102, 3)]);
}

/// Run every scenario, each against a fresh store from `make`.
pub fn run_all<S: OrderStore>(mut make: impl FnMut() -> S) {
    creates_append_per_scope(make());
    assign_highest_position_persists(make());
    move_before_shifts_block(make());
    move_after_then_before_restores_adjacency(make());
    move_up_and_down_swap_neighbours(make());
    swap_twice_restores(make());
    move_to_end_and_start(make());
    move_to_position_both_directions(make());
    soft_delete_closes_gap(make());
    purge_of_trashed_only_renumbers(make());
    set_new_order_rewrites_including_trashed(make());
    set_new_order_rejects_bad_column(make());
    atomically_rolls_back(make());
}
