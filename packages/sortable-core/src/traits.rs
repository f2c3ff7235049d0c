use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ids::{Position, RecordId, Value};
use crate::scope::{Aggregate, Direction, PositionRange, Scope};

/// Accessor pair the maintainer uses to read and write a record's rank.
pub trait Record {
    fn key(&self) -> RecordId;
    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);
}

/// A persisted record as seen by the maintainer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry {
    pub key: RecordId,
    pub position: Position,
    pub trashed: bool,
}

impl Entry {
    pub fn new(key: RecordId, position: Position) -> Self {
        Self {
            key,
            position,
            trashed: false,
        }
    }
}

impl Record for Entry {
    fn key(&self) -> RecordId {
        self.key
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

/// A row about to be inserted. `fields` carries the scope columns (foreign keys and the like).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewRecord {
    pub key: RecordId,
    pub position: Position,
    pub fields: BTreeMap<String, Value>,
}

impl NewRecord {
    pub fn new(key: impl Into<RecordId>) -> Self {
        Self {
            key: key.into(),
            position: 0,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn entry(&self) -> Entry {
        Entry::new(self.key, self.position)
    }
}

impl Record for NewRecord {
    fn key(&self) -> RecordId {
        self.key
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

/// Scoped record store the maintainer reads positions from and issues writes to.
///
/// `shift` must be a single bulk statement in SQL-backed adapters.
pub trait OrderStore {
    /// Primary key column, used when bulk reassignment is not given a custom column.
    fn key_column(&self) -> &str;
    /// Column positions are written to, when the store is bound to a named one.
    fn order_column(&self) -> Option<&str> {
        None
    }

    fn supports_soft_delete(&self) -> bool;

    fn aggregate(&self, scope: &Scope, aggregate: Aggregate) -> Result<Option<Position>>;
    fn shift(&mut self, scope: &Scope, range: &PositionRange, delta: Position) -> Result<u64>;
    fn update_position(&mut self, key: RecordId, position: Position) -> Result<()>;
    fn update_position_where(
        &mut self,
        scope: &Scope,
        column: &str,
        value: &Value,
        position: Position,
    ) -> Result<u64>;
    fn fetch_ordered(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Vec<Entry>>;

    fn fetch_first(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Option<Entry>> {
        Ok(self.fetch_ordered(scope, range, direction)?.into_iter().next())
    }

    fn insert(&mut self, record: &NewRecord) -> Result<()>;
    fn find(&self, key: RecordId) -> Result<Option<Entry>>;
    /// Returns whether a live row was trashed.
    fn soft_delete(&mut self, key: RecordId) -> Result<bool>;
    /// Returns whether a row was removed.
    fn force_delete(&mut self, key: RecordId) -> Result<bool>;

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct MemoryRow {
    position: Position,
    fields: BTreeMap<String, Value>,
    trashed: bool,
}

/// In-memory map-backed store for tests and prototyping.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    key_column: String,
    soft_deletes: bool,
    rows: BTreeMap<RecordId, MemoryRow>,
    snapshot: Option<BTreeMap<RecordId, MemoryRow>>,
    writes: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            key_column: "id".to_string(),
            soft_deletes: true,
            rows: BTreeMap::new(),
            snapshot: None,
            writes: 0,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose table has no soft-delete column.
    pub fn without_soft_deletes() -> Self {
        Self {
            soft_deletes: false,
            ..Self::default()
        }
    }

    /// Number of write calls received; reads are not counted.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn column_value(&self, key: RecordId, row: &MemoryRow, column: &str) -> Value {
        if column == self.key_column {
            Value::Int(key.0)
        } else {
            row.fields.get(column).cloned().unwrap_or(Value::Null)
        }
    }

    fn selected<'a>(
        &'a self,
        scope: &'a Scope,
        range: &'a PositionRange,
    ) -> impl Iterator<Item = (RecordId, &'a MemoryRow)> + 'a {
        self.rows
            .iter()
            .filter(move |(key, row)| {
                scope.matches(&row.fields, row.trashed) && range.contains(**key, row.position)
            })
            .map(|(key, row)| (*key, row))
    }
}

impl OrderStore for MemoryStore {
    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn supports_soft_delete(&self) -> bool {
        self.soft_deletes
    }

    fn aggregate(&self, scope: &Scope, aggregate: Aggregate) -> Result<Option<Position>> {
        let all = PositionRange::all();
        let positions = self.selected(scope, &all).map(|(_, row)| row.position);
        Ok(match aggregate {
            Aggregate::Min => positions.min(),
            Aggregate::Max => positions.max(),
        })
    }

    fn shift(&mut self, scope: &Scope, range: &PositionRange, delta: Position) -> Result<u64> {
        self.writes += 1;
        let keys: Vec<RecordId> = self.selected(scope, range).map(|(key, _)| key).collect();
        for key in &keys {
            if let Some(row) = self.rows.get_mut(key) {
                row.position += delta;
            }
        }
        Ok(keys.len() as u64)
    }

    fn update_position(&mut self, key: RecordId, position: Position) -> Result<()> {
        self.writes += 1;
        if let Some(row) = self.rows.get_mut(&key) {
            row.position = position;
        }
        Ok(())
    }

    fn update_position_where(
        &mut self,
        scope: &Scope,
        column: &str,
        value: &Value,
        position: Position,
    ) -> Result<u64> {
        self.writes += 1;
        let all = PositionRange::all();
        let keys: Vec<RecordId> = self
            .selected(scope, &all)
            .filter(|(key, row)| &self.column_value(*key, row, column) == value)
            .map(|(key, _)| key)
            .collect();
        for key in &keys {
            if let Some(row) = self.rows.get_mut(key) {
                row.position = position;
            }
        }
        Ok(keys.len() as u64)
    }

    fn fetch_ordered(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .selected(scope, range)
            .map(|(key, row)| Entry {
                key,
                position: row.position,
                trashed: row.trashed,
            })
            .collect();
        entries.sort_by_key(|e| (e.position, e.key));
        if direction == Direction::Desc {
            entries.reverse();
        }
        Ok(entries)
    }

    fn insert(&mut self, record: &NewRecord) -> Result<()> {
        if self.rows.contains_key(&record.key) {
            return Err(Error::Storage(format!(
                "duplicate primary key {}",
                record.key
            )));
        }
        self.writes += 1;
        self.rows.insert(
            record.key,
            MemoryRow {
                position: record.position,
                fields: record.fields.clone(),
                trashed: false,
            },
        );
        Ok(())
    }

    fn find(&self, key: RecordId) -> Result<Option<Entry>> {
        Ok(self.rows.get(&key).map(|row| Entry {
            key,
            position: row.position,
            trashed: row.trashed,
        }))
    }

    fn soft_delete(&mut self, key: RecordId) -> Result<bool> {
        if !self.soft_deletes {
            return Err(Error::InvalidInput(
                "store has no soft-delete column".into(),
            ));
        }
        self.writes += 1;
        match self.rows.get_mut(&key) {
            Some(row) if !row.trashed => {
                row.trashed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn force_delete(&mut self, key: RecordId) -> Result<bool> {
        self.writes += 1;
        Ok(self.rows.remove(&key).is_some())
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::Storage("transaction already open".into()));
        }
        self.snapshot = Some(self.rows.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(rows) = self.snapshot.take() {
            self.rows = rows;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        for (key, position, list) in [(1, 1, 10), (2, 2, 10), (3, 3, 10), (4, 1, 20)] {
            store
                .insert(
                    &NewRecord::new(key)
                        .with_position(position)
                        .with_field("list_id", list),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn aggregates_respect_scope() {
        let store = seeded();
        let scope = Scope::all().where_eq("list_id", 10);
        assert_eq!(store.aggregate(&scope, Aggregate::Max).unwrap(), Some(3));
        assert_eq!(store.aggregate(&scope, Aggregate::Min).unwrap(), Some(1));
        let empty = Scope::all().where_eq("list_id", 99);
        assert_eq!(store.aggregate(&empty, Aggregate::Max).unwrap(), None);
    }

    #[test]
    fn shift_only_touches_range() {
        let mut store = seeded();
        let scope = Scope::all().where_eq("list_id", 10);
        let n = store.shift(&scope, &PositionRange::above(1), 1).unwrap();
        assert_eq!(n, 2);
        let positions: Vec<_> = store
            .fetch_ordered(&scope, &PositionRange::all(), Direction::Asc)
            .unwrap()
            .into_iter()
            .map(|e| (e.key.0, e.position))
            .collect();
        assert_eq!(positions, vec![(1, 1), (2, 3), (3, 4)]);
        assert_eq!(store.find(RecordId(4)).unwrap().unwrap().position, 1);
    }

    #[test]
    fn trashed_rows_leave_the_scope() {
        let mut store = seeded();
        assert!(store.soft_delete(RecordId(2)).unwrap());
        assert!(!store.soft_delete(RecordId(2)).unwrap());
        let scope = Scope::all().where_eq("list_id", 10);
        let live = store
            .fetch_ordered(&scope, &PositionRange::all(), Direction::Asc)
            .unwrap();
        assert_eq!(live.len(), 2);
        let all = store
            .fetch_ordered(&scope.with_trashed(), &PositionRange::all(), Direction::Asc)
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut store = seeded();
        store.begin().unwrap();
        store.update_position(RecordId(1), 42).unwrap();
        store.rollback().unwrap();
        assert_eq!(store.find(RecordId(1)).unwrap().unwrap().position, 1);
    }

    #[test]
    fn duplicate_insert_is_a_storage_error() {
        let mut store = seeded();
        let err = store.insert(&NewRecord::new(1)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
