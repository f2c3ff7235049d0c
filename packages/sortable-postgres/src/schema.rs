use postgres::Client;
use tracing::info;

use sortable_core::{validate_identifier, Error, Result, TableSpec};

const SCHEMA_LOCK_KEY: i64 = 0x736f727461626c65; // "sortable"

/// Add the order column (and a `(scope columns..., order column)` index) to an existing table.
pub fn ensure_order_column(
    client: &mut Client,
    table: &TableSpec,
    scope_columns: &[&str],
) -> Result<()> {
    table.validate()?;
    let mut index_columns: Vec<&str> = Vec::with_capacity(scope_columns.len() + 1);
    for column in scope_columns {
        index_columns.push(validate_identifier(column)?);
    }
    index_columns.push(table.order_column.as_str());

    let sql = format!(
        "ALTER TABLE {t} ADD COLUMN IF NOT EXISTS {o} BIGINT NOT NULL DEFAULT 0;
         CREATE INDEX IF NOT EXISTS idx_{t}_{o} ON {t} ({cols});",
        t = table.table,
        o = table.order_column,
        cols = index_columns.join(", "),
    );

    // Concurrent `IF NOT EXISTS` DDL can still collide in the catalog; serialize it.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(|e| Error::Storage(format!("{e:?}")))?;

    let res = client
        .batch_execute(&sql)
        .map_err(|e| Error::Storage(format!("{e:?}")));

    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    if res.is_ok() {
        info!(table = %table.table, column = %table.order_column, "order column ensured");
    }
    res
}
