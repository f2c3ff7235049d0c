use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use postgres::types::ToSql;
use postgres::{Client, Row, Statement};
use tracing::trace;

use sortable_core::{
    Aggregate, Direction, Entry, Error, NewRecord, OrderStore, Placeholder, Position,
    PositionRange, Query, RecordId, Result, Scope, SqlBuilder, TableSpec, Value,
};

fn storage_debug<E: std::fmt::Debug>(e: E) -> Error {
    Error::Storage(format!("{e:?}"))
}

fn to_sql(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Int(v) => Box::new(*v),
        Value::Text(s) => Box::new(s.clone()),
        Value::Null => Box::new(Option::<String>::None),
    }
}

fn row_to_entry(row: &Row) -> Result<Entry> {
    Ok(Entry {
        key: RecordId(row.try_get::<_, i64>(0).map_err(storage_debug)?),
        position: row.try_get::<_, i64>(1).map_err(storage_debug)?,
        trashed: row.try_get::<_, i32>(2).map_err(storage_debug)? != 0,
    })
}

/// `OrderStore` over one table, sharing a client the way the rest of the application does.
pub struct PgStore {
    client: Rc<RefCell<Client>>,
    sql: SqlBuilder,
    stmts: RefCell<HashMap<String, Statement>>,
}

impl PgStore {
    pub fn new(client: Rc<RefCell<Client>>, table: TableSpec) -> Result<Self> {
        let sql = SqlBuilder::new(table, Placeholder::Dollar)?;
        Ok(Self {
            client,
            sql,
            stmts: RefCell::new(HashMap::new()),
        })
    }

    pub fn client(&self) -> &Rc<RefCell<Client>> {
        &self.client
    }

    pub fn table(&self) -> &TableSpec {
        self.sql.table()
    }

    fn stmt(&self, c: &mut Client, sql: &str) -> Result<Statement> {
        if let Some(stmt) = self.stmts.borrow().get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = c.prepare(sql).map_err(storage_debug)?;
        self.stmts.borrow_mut().insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }

    fn execute(&self, query: &Query) -> Result<u64> {
        trace!(sql = %query.sql, "postgres execute");
        let params: Vec<Box<dyn ToSql + Sync>> = query.params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| &**p).collect();
        let mut c = self.client.borrow_mut();
        let stmt = self.stmt(&mut c, &query.sql)?;
        c.execute(&stmt, &refs).map_err(storage_debug)
    }

    fn query(&self, query: &Query) -> Result<Vec<Row>> {
        trace!(sql = %query.sql, "postgres query");
        let params: Vec<Box<dyn ToSql + Sync>> = query.params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| &**p).collect();
        let mut c = self.client.borrow_mut();
        let stmt = self.stmt(&mut c, &query.sql)?;
        c.query(&stmt, &refs).map_err(storage_debug)
    }
}

impl OrderStore for PgStore {
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
        let rows = self.query(&self.sql.aggregate(scope, aggregate)?)?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Storage("aggregate returned no row".into()))?;
        row.try_get::<_, Option<i64>>(0).map_err(storage_debug)
    }

    fn shift(&mut self, scope: &Scope, range: &PositionRange, delta: Position) -> Result<u64> {
        self.execute(&self.sql.shift(scope, range, delta)?)
    }

    fn update_position(&mut self, key: RecordId, position: Position) -> Result<()> {
        self.execute(&self.sql.update_position(key, position)?)?;
        Ok(())
    }

    fn update_position_where(
        &mut self,
        scope: &Scope,
        column: &str,
        value: &Value,
        position: Position,
    ) -> Result<u64> {
        self.execute(&self.sql.update_position_where(scope, column, value, position)?)
    }

    fn fetch_ordered(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Vec<Entry>> {
        let rows = self.query(&self.sql.fetch_ordered(scope, range, direction, None)?)?;
        rows.iter().map(row_to_entry).collect()
    }

    fn fetch_first(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
    ) -> Result<Option<Entry>> {
        let rows = self.query(&self.sql.fetch_ordered(scope, range, direction, Some(1))?)?;
        rows.first().map(row_to_entry).transpose()
    }

    fn insert(&mut self, record: &NewRecord) -> Result<()> {
        self.execute(&self.sql.insert(record)?)?;
        Ok(())
    }

    fn find(&self, key: RecordId) -> Result<Option<Entry>> {
        let rows = self.query(&self.sql.find(key)?)?;
        rows.first().map(row_to_entry).transpose()
    }

    fn soft_delete(&mut self, key: RecordId) -> Result<bool> {
        let query = self
            .sql
            .soft_delete(key)
            .ok_or_else(|| Error::InvalidInput("table has no soft-delete column".into()))?;
        Ok(self.execute(&query)? > 0)
    }

    fn force_delete(&mut self, key: RecordId) -> Result<bool> {
        Ok(self.execute(&self.sql.force_delete(key))? > 0)
    }

    fn begin(&mut self) -> Result<()> {
        self.client
            .borrow_mut()
            .batch_execute("BEGIN")
            .map_err(storage_debug)
    }

    fn commit(&mut self) -> Result<()> {
        self.client
            .borrow_mut()
            .batch_execute("COMMIT")
            .map_err(storage_debug)
    }

    fn rollback(&mut self) -> Result<()> {
        self.client
            .borrow_mut()
            .batch_execute("ROLLBACK")
            .map_err(storage_debug)
    }
}
