#![forbid(unsafe_code)]
//! Gap-free position maintenance for records kept in a relational table.
//! Each record carries an integer rank among the peers selected by a caller-supplied scope; the
//! maintainer computes range shifts and renumbering while a pluggable store executes them.
//! This crate stays independent of concrete databases; adapters implement [`OrderStore`].

pub mod config;
pub mod error;
pub mod ids;
pub mod maintainer;
pub mod scope;
pub mod sql;
pub mod traits;

pub use config::SortableConfig;
pub use error::{Error, Result};
pub use ids::{Position, RecordId, Value};
pub use maintainer::{DeleteKind, OrderMaintainer};
pub use scope::{validate_identifier, Aggregate, Direction, PositionRange, Scope};
pub use sql::{Placeholder, Query, SqlBuilder, TableSpec};
pub use traits::{Entry, MemoryStore, NewRecord, OrderStore, Record};
