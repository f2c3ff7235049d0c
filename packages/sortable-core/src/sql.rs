//! SQL text generation shared by the relational store adapters.
//!
//! Adapters differ only in placeholder syntax and parameter binding, so statements are built here
//! as text plus a list of [`Value`] parameters.

use std::fmt::Write;
use std::ops::Bound;

use crate::config::SortableConfig;
use crate::error::Result;
use crate::ids::{Position, RecordId, Value};
use crate::scope::{validate_identifier, Aggregate, Direction, PositionRange, Scope};
use crate::traits::NewRecord;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placeholder {
    /// `?1`, `?2`, ... (SQLite)
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
}

/// Where the sortable records live.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSpec {
    pub table: String,
    pub key_column: String,
    pub order_column: String,
    pub deleted_column: Option<String>,
}

impl TableSpec {
    pub fn new(table: impl Into<String>, config: &SortableConfig) -> Self {
        Self {
            table: table.into(),
            key_column: "id".to_string(),
            order_column: config.order_column_name.clone(),
            deleted_column: None,
        }
    }

    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Enable soft deletes through a nullable timestamp column.
    pub fn with_soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.deleted_column = Some(column.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.key_column)?;
        validate_identifier(&self.order_column)?;
        if let Some(col) = &self.deleted_column {
            validate_identifier(col)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

struct Writer {
    style: Placeholder,
    sql: String,
    params: Vec<Value>,
}

impl Writer {
    fn new(style: Placeholder, head: String) -> Self {
        Self {
            style,
            sql: head,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        match self.style {
            Placeholder::Question => format!("?{}", self.params.len()),
            Placeholder::Dollar => format!("${}", self.params.len()),
        }
    }

    fn finish(self) -> Query {
        Query {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Builds statements for one table in one placeholder dialect.
#[derive(Clone, Debug)]
pub struct SqlBuilder {
    table: TableSpec,
    style: Placeholder,
}

impl SqlBuilder {
    pub fn new(table: TableSpec, style: Placeholder) -> Result<Self> {
        table.validate()?;
        Ok(Self { table, style })
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    fn push_where(&self, w: &mut Writer, scope: &Scope, range: &PositionRange) -> Result<()> {
        let mut clauses: Vec<String> = Vec::new();
        for (column, value) in scope.filters() {
            let column = validate_identifier(column)?;
            match value {
                Value::Null => clauses.push(format!("{column} IS NULL")),
                v => {
                    let p = w.bind(v.clone());
                    clauses.push(format!("{column} = {p}"));
                }
            }
        }
        if let Some(deleted) = &self.table.deleted_column {
            if !scope.includes_trashed() {
                clauses.push(format!("{deleted} IS NULL"));
            }
        }
        let order = &self.table.order_column;
        match range.lower {
            Bound::Included(lo) => {
                let p = w.bind(Value::Int(lo));
                clauses.push(format!("{order} >= {p}"));
            }
            Bound::Excluded(lo) => {
                let p = w.bind(Value::Int(lo));
                clauses.push(format!("{order} > {p}"));
            }
            Bound::Unbounded => {}
        }
        match range.upper {
            Bound::Included(hi) => {
                let p = w.bind(Value::Int(hi));
                clauses.push(format!("{order} <= {p}"));
            }
            Bound::Excluded(hi) => {
                let p = w.bind(Value::Int(hi));
                clauses.push(format!("{order} < {p}"));
            }
            Bound::Unbounded => {}
        }
        if let Some(key) = range.exclude {
            let p = w.bind(Value::Int(key.0));
            clauses.push(format!("{} <> {p}", self.table.key_column));
        }
        if !clauses.is_empty() {
            let _ = write!(w.sql, " WHERE {}", clauses.join(" AND "));
        }
        Ok(())
    }

    fn trashed_expr(&self) -> String {
        match &self.table.deleted_column {
            Some(col) => format!("CASE WHEN {col} IS NULL THEN 0 ELSE 1 END"),
            None => "0".to_string(),
        }
    }

    pub fn aggregate(&self, scope: &Scope, aggregate: Aggregate) -> Result<Query> {
        let func = match aggregate {
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        };
        let mut w = Writer::new(
            self.style,
            format!(
                "SELECT {func}({}) FROM {}",
                self.table.order_column, self.table.table
            ),
        );
        self.push_where(&mut w, scope, &PositionRange::all())?;
        Ok(w.finish())
    }

    pub fn shift(&self, scope: &Scope, range: &PositionRange, delta: Position) -> Result<Query> {
        let order = &self.table.order_column;
        let mut w = Writer::new(self.style, String::new());
        let p = w.bind(Value::Int(delta));
        w.sql = format!("UPDATE {} SET {order} = {order} + {p}", self.table.table);
        self.push_where(&mut w, scope, range)?;
        Ok(w.finish())
    }

    pub fn update_position(&self, key: RecordId, position: Position) -> Result<Query> {
        let mut w = Writer::new(self.style, String::new());
        let p_pos = w.bind(Value::Int(position));
        let p_key = w.bind(Value::Int(key.0));
        w.sql = format!(
            "UPDATE {} SET {} = {p_pos} WHERE {} = {p_key}",
            self.table.table, self.table.order_column, self.table.key_column
        );
        Ok(w.finish())
    }

    pub fn update_position_where(
        &self,
        scope: &Scope,
        column: &str,
        value: &Value,
        position: Position,
    ) -> Result<Query> {
        let column = validate_identifier(column)?;
        let scope = scope.clone().where_eq(column, value.clone());
        let mut w = Writer::new(self.style, String::new());
        let p_pos = w.bind(Value::Int(position));
        w.sql = format!(
            "UPDATE {} SET {} = {p_pos}",
            self.table.table, self.table.order_column
        );
        self.push_where(&mut w, &scope, &PositionRange::all())?;
        Ok(w.finish())
    }

    /// Selects `(key, position, trashed)` rows; `trashed` is an integer 0/1.
    pub fn fetch_ordered(
        &self,
        scope: &Scope,
        range: &PositionRange,
        direction: Direction,
        limit: Option<u32>,
    ) -> Result<Query> {
        let mut w = Writer::new(
            self.style,
            format!(
                "SELECT {}, {}, {} FROM {}",
                self.table.key_column,
                self.table.order_column,
                self.trashed_expr(),
                self.table.table
            ),
        );
        self.push_where(&mut w, scope, range)?;
        let dir = match direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        let _ = write!(
            w.sql,
            " ORDER BY {} {dir}, {} {dir}",
            self.table.order_column, self.table.key_column
        );
        if let Some(limit) = limit {
            let _ = write!(w.sql, " LIMIT {limit}");
        }
        Ok(w.finish())
    }

    pub fn find(&self, key: RecordId) -> Result<Query> {
        let mut w = Writer::new(self.style, String::new());
        let p = w.bind(Value::Int(key.0));
        w.sql = format!(
            "SELECT {}, {}, {} FROM {} WHERE {} = {p}",
            self.table.key_column,
            self.table.order_column,
            self.trashed_expr(),
            self.table.table,
            self.table.key_column
        );
        Ok(w.finish())
    }

    /// NULL fields are left out so the column default applies.
    pub fn insert(&self, record: &NewRecord) -> Result<Query> {
        let mut columns = vec![self.table.key_column.clone(), self.table.order_column.clone()];
        let mut w = Writer::new(self.style, String::new());
        let mut placeholders = vec![
            w.bind(Value::Int(record.key.0)),
            w.bind(Value::Int(record.position)),
        ];
        for (column, value) in &record.fields {
            if *value == Value::Null {
                continue;
            }
            columns.push(validate_identifier(column)?.to_string());
            placeholders.push(w.bind(value.clone()));
        }
        w.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(w.finish())
    }

    /// `None` when the table has no soft-delete column.
    pub fn soft_delete(&self, key: RecordId) -> Option<Query> {
        let deleted = self.table.deleted_column.as_ref()?;
        let mut w = Writer::new(self.style, String::new());
        let p = w.bind(Value::Int(key.0));
        w.sql = format!(
            "UPDATE {} SET {deleted} = CURRENT_TIMESTAMP WHERE {} = {p} AND {deleted} IS NULL",
            self.table.table, self.table.key_column
        );
        Some(w.finish())
    }

    pub fn force_delete(&self, key: RecordId) -> Query {
        let mut w = Writer::new(self.style, String::new());
        let p = w.bind(Value::Int(key.0));
        w.sql = format!(
            "DELETE FROM {} WHERE {} = {p}",
            self.table.table, self.table.key_column
        );
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(style: Placeholder) -> SqlBuilder {
        let spec =
            TableSpec::new("items", &SortableConfig::default()).with_soft_deletes("deleted_at");
        SqlBuilder::new(spec, style).unwrap()
    }

    #[test]
    fn shift_renders_single_update() {
        let q = builder(Placeholder::Dollar)
            .shift(
                &Scope::all().where_eq("list_id", 3),
                &PositionRange::new(Bound::Included(2), Bound::Excluded(5)),
                1,
            )
            .unwrap();
        assert_eq!(
            q.sql,
            "UPDATE items SET order_column = order_column + $1 WHERE list_id = $2 AND deleted_at IS NULL AND order_column >= $3 AND order_column < $4"
        );
        assert_eq!(
            q.params,
            vec![Value::Int(1), Value::Int(3), Value::Int(2), Value::Int(5)]
        );
    }

    #[test]
    fn fetch_first_descending_with_exclusion() {
        let q = builder(Placeholder::Question)
            .fetch_ordered(
                &Scope::all(),
                &PositionRange::below(4).excluding(RecordId(9)),
                Direction::Desc,
                Some(1),
            )
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT id, order_column, CASE WHEN deleted_at IS NULL THEN 0 ELSE 1 END FROM items WHERE deleted_at IS NULL AND order_column < ?1 AND id <> ?2 ORDER BY order_column DESC, id DESC LIMIT 1"
        );
    }

    #[test]
    fn trashed_scope_drops_deleted_filter() {
        let q = builder(Placeholder::Question)
            .update_position_where(&Scope::all().with_trashed(), "id", &Value::Int(4), 1)
            .unwrap();
        assert_eq!(q.sql, "UPDATE items SET order_column = ?1 WHERE id = ?2");
    }

    #[test]
    fn insert_skips_null_fields() {
        let record = NewRecord::new(5)
            .with_position(2)
            .with_field("list_id", 1)
            .with_field("parent", Value::Null);
        let q = builder(Placeholder::Dollar).insert(&record).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO items (id, order_column, list_id) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn rejects_hostile_identifiers() {
        let b = builder(Placeholder::Question);
        assert!(b
            .aggregate(&Scope::all().where_eq("x; --", 1), Aggregate::Max)
            .is_err());
        let spec = TableSpec::new("items", &SortableConfig::default().with_order_column("a b"));
        assert!(SqlBuilder::new(spec, Placeholder::Question).is_err());
    }

    #[test]
    fn soft_delete_needs_column() {
        let spec = TableSpec::new("items", &SortableConfig::default());
        let b = SqlBuilder::new(spec, Placeholder::Question).unwrap();
        assert!(b.soft_delete(RecordId(1)).is_none());
    }
}
