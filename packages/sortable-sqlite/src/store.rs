use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension, Row};
use tracing::trace;

use sortable_core::{
    Aggregate, Direction, Entry, Error, NewRecord, OrderStore, Placeholder, Position,
    PositionRange, Query, RecordId, Result, Scope, SqlBuilder, TableSpec, Value,
};

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Null => SqlValue::Null,
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let key: i64 = row.get(0)?;
    let position: i64 = row.get(1)?;
    let trashed: i64 = row.get(2)?;
    Ok(Entry {
        key: RecordId(key),
        position,
        trashed: trashed != 0,
    })
}

/// `OrderStore` over one table of a SQLite database.
pub struct SqliteStore {
    conn: Connection,
    sql: SqlBuilder,
}

impl SqliteStore {
    pub fn new(conn: Connection, table: TableSpec) -> Result<Self> {
        let sql = SqlBuilder::new(table, Placeholder::Question)?;
        Ok(Self { conn, sql })
    }

    pub fn open(path: &str, table: TableSpec) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::new(conn, table)
    }

    pub fn open_in_memory(table: TableSpec) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::new(conn, table)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table(&self) -> &TableSpec {
        self.sql.table()
    }

    fn execute(&self, query: &Query) -> Result<u64> {
        trace!(sql = %query.sql, "sqlite execute");
        let changed = self
            .conn
            .execute(&query.sql, params_from_iter(query.params.iter().map(to_sql)))
            .map_err(storage)?;
        Ok(changed as u64)
    }

    fn query_entries(&self, query: &Query) -> Result<Vec<Entry>> {
        trace!(sql = %query.sql, "sqlite query");
        let mut stmt = self.conn.prepare(&query.sql).map_err(storage)?;
        let rows = stmt
            .query_map(params_from_iter(query.params.iter().map(to_sql)), row_to_entry)
            .map_err(storage)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry.map_err(storage)?);
        }
        Ok(entries)
    }
}

impl OrderStore for SqliteStore {
    fn key_column(&self) -> &str {
        &self.sql.table().key_column
    }

    fn order_column(&self) -> Option<&str> {
        Some(&self.sql.table().order_column)
    }

    fn supports_soft_delete(&self) -> bool {
        self.sql.table().deleted_column.is_some()
    }

    fn aggregate(&self, scope: &Scope, aggregate: Aggregate) -> Result<Option<Position>> {
        let query = self.sql.aggregate(scope, aggregate)?;
        trace!(sql = %query.sql, "sqlite aggregate");
        self.conn
            .query_row(
                &query.sql,
                params_from_iter(query.params.iter().map(to_sql)),
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(storage)
    }

    fn shift(&mut self, scope: &Scope, range: &PositionRange, delta: Position) -> Result<u64> {
        let query = self.sql.shift(scope, range, delta)?;
        self.execute(&query)
    }

    fn update_position(&mut self, key: RecordId, position: Position) -> Result<()> {
        let query = self.sql.update_position(key, position)?;
        self.execute(&query)?;
        Ok(())
    }

    fn update_position_where(
        &mut self,
        scope: &Scope,
        column: &str,
        value: &Value,
        position: Position,
    ) -> Result<u64> {
        let query = self.sql.update_position_where(scope, column, value, position)?;
        self.execute(&query)
    }

    fn fetch_ordered(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Vec<Entry>> {
        let query = self.sql.fetch_ordered(scope, range, direction, None)?;
        self.query_entries(&query)
    }

    fn fetch_first(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Option<Entry>> {
        let query = self.sql.fetch_ordered(scope, range, direction, Some(1))?;
        Ok(self.query_entries(&query)?.into_iter().next())
    }

    fn insert(&mut self, record: &NewRecord) -> Result<()> {
        let query = self.sql.insert(record)?;
        self.execute(&query)?;
        Ok(())
    }

    fn find(&self, key: RecordId) -> Result<Option<Entry>> {
        let query = self.sql.find(key)?;
        trace!(sql = %query.sql, "sqlite find");
        self.conn
            .query_row(
                &query.sql,
                params_from_iter(query.params.iter().map(to_sql)),
                row_to_entry,
            )
            .optional()
            .map_err(storage)
    }

    fn soft_delete(&mut self, key: RecordId) -> Result<bool> {
        let query = self
            .sql
            .soft_delete(key)
            .ok_or_else(|| Error::InvalidInput("table has no soft-delete column".into()))?;
        Ok(self.execute(&query)? > 0)
    }

    fn force_delete(&mut self, key: RecordId) -> Result<bool> {
        let query = self.sql.force_delete(key);
        Ok(self.execute(&query)? > 0)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(storage)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(storage)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortable_core::SortableConfig;

    fn store() -> SqliteStore {
        let table = TableSpec::new("items", &SortableConfig::default());
        let store = SqliteStore::open_in_memory(table).unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE items (
                    id INTEGER PRIMARY KEY,
                    order_column INTEGER NOT NULL,
                    list_id INTEGER
                );",
            )
            .unwrap();
        store
    }

    #[test]
    fn aggregate_of_empty_table_is_none() {
        let store = store();
        assert_eq!(store.aggregate(&Scope::all(), Aggregate::Max).unwrap(), None);
    }

    #[test]
    fn insert_find_and_shift() {
        let mut store = store();
        for key in 1..=3 {
            store
                .insert(&NewRecord::new(key).with_position(key).with_field("list_id", 1))
                .unwrap();
        }
        let changed = store
            .shift(&Scope::all().where_eq("list_id", 1), &PositionRange::above(1), 5)
            .unwrap();
        assert_eq!(changed, 2);
        let entry = store.find(RecordId(3)).unwrap().unwrap();
        assert_eq!(entry.position, 8);
        assert!(!entry.trashed);
        assert!(store.find(RecordId(9)).unwrap().is_none());
    }

    #[test]
    fn soft_delete_without_column_is_invalid_input() {
        let mut store = store();
        store.insert(&NewRecord::new(1).with_position(1)).unwrap();
        assert!(!store.supports_soft_delete());
        assert!(matches!(
            store.soft_delete(RecordId(1)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_table_surfaces_as_storage_error() {
        let table = TableSpec::new("nope", &SortableConfig::default());
        let store = SqliteStore::open_in_memory(table).unwrap();
        assert!(matches!(
            store.aggregate(&Scope::all(), Aggregate::Max),
            Err(Error::Storage(_))
        ));
    }
}
