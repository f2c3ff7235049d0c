#![forbid(unsafe_code)]
//! Postgres adapter for `sortable-core`.
//!
//! Positions stay in the application's own table in vanilla PostgreSQL. Order and key columns are
//! expected to be `BIGINT`; integer scope columns too. Do not put a plain `UNIQUE` constraint on
//! the order column: range shifts update many rows in one statement and would trip it mid-way.

mod schema;
mod store;

pub use schema::ensure_order_column;
pub use store::PgStore;
