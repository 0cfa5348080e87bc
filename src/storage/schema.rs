//! Results table schema.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// Reject anything that is not a plain SQL identifier; the table name is
/// interpolated into statements.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid results table name '{}'", table);
    }
    Ok(())
}

/// Create the results table and its index if they do not exist yet.
pub fn ensure_results_table(conn: &Connection, table: &str) -> Result<()> {
    validate_table_name(table)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            run_id TEXT NOT NULL,
            test_name TEXT NOT NULL,
            status TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_test_name ON {table}(test_name);"
    ))?;
    Ok(())
}

/// Whether `table` exists in the connected database.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
