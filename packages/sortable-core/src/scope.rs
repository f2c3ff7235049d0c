use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{Error, Result};
use crate::ids::{Position, RecordId, Value};

/// Sort direction over the order column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Aggregate {
    Min,
    Max,
}

/// The peers of a record: a conjunction of column equality filters.
///
/// Soft-deleted rows are outside every scope unless `with_trashed` is set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Scope {
    filters: Vec<(String, Value)>,
    with_trashed: bool,
}

impl Scope {
    /// Every live record of the table.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to rows where `column = value` (`IS NULL` for [`Value::Null`]).
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.with_trashed = true;
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn includes_trashed(&self) -> bool {
        self.with_trashed
    }

    /// Evaluate the filters against a row's column values. Missing columns compare as NULL.
    pub fn matches(&self, fields: &BTreeMap<String, Value>, trashed: bool) -> bool {
        if trashed && !self.with_trashed {
            return false;
        }
        self.filters.iter().all(|(column, expected)| {
            let actual = fields.get(column).unwrap_or(&Value::Null);
            actual == expected
        })
    }
}

/// Position window (plus an optional excluded key) selecting rows inside a scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PositionRange {
    pub lower: Bound<Position>,
    pub upper: Bound<Position>,
    pub exclude: Option<RecordId>,
}

impl Default for PositionRange {
    fn default() -> Self {
        Self::all()
    }
}

impl PositionRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            exclude: None,
        }
    }

    pub fn new(lower: Bound<Position>, upper: Bound<Position>) -> Self {
        Self {
            lower,
            upper,
            exclude: None,
        }
    }

    /// Strictly greater than `position`.
    pub fn above(position: Position) -> Self {
        Self::new(Bound::Excluded(position), Bound::Unbounded)
    }

    /// Strictly less than `position`.
    pub fn below(position: Position) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(position))
    }

    pub fn excluding(mut self, key: RecordId) -> Self {
        self.exclude = Some(key);
        self
    }

    pub fn contains(&self, key: RecordId, position: Position) -> bool {
        if self.exclude == Some(key) {
            return false;
        }
        let lower_ok = match self.lower {
            Bound::Included(lo) => position >= lo,
            Bound::Excluded(lo) => position > lo,
            Bound::Unbounded => true,
        };
        let upper_ok = match self.upper {
            Bound::Included(hi) => position <= hi,
            Bound::Excluded(hi) => position < hi,
            Bound::Unbounded => true,
        };
        lower_ok && upper_ok
    }
}

/// Reject anything that is not a plain SQL identifier; column names are spliced into statements.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!("invalid column identifier: {name:?}")))
    }
}
