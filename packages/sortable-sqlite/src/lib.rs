#![forbid(unsafe_code)]
//! SQLite adapter for `sortable-core`.
//! Positions live in an ordinary application table; range shifts are single `UPDATE` statements.

mod store;

pub use store::SqliteStore;
