//! SQLite results store -- append-only rows of scenario outcomes.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use uuid::Uuid;

use crate::report::{OutcomeStatus, TestOutcome};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = R2D2Pool::builder()
        .max_size(2)
        .build(manager)
        .with_context(|| format!("failed to open results database {}", path.display()))?;
    Ok(pool)
}

/// A row read back from the results table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredOutcome {
    pub id: i64,
    pub run_id: Uuid,
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

/// Append-only store of test outcomes in a single table.
pub struct ResultsStore {
    pool: Pool,
    table: String,
}

impl ResultsStore {
    /// Open the store. With `create`, the table is created if missing;
    /// otherwise writes to a missing table fail.
    pub fn open(path: &Path, table: &str, create: bool) -> Result<Self> {
        schema::validate_table_name(table)?;
        let pool = open_pool(path)?;
        if create {
            let conn = pool.get()?;
            schema::ensure_results_table(&conn, table)?;
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the results table has been created yet.
    pub fn has_table(&self) -> Result<bool> {
        let conn = self.pool.get()?;
        schema::table_exists(&conn, &self.table)
    }

    /// Append one outcome.
    pub fn log_test_result(&self, run_id: Uuid, outcome: &TestOutcome) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (run_id, test_name, status, timestamp) VALUES (?1, ?2, ?3, ?4)",
                self.table
            ),
            params![
                run_id.to_string(),
                outcome.test_name,
                outcome.status.to_string(),
                outcome.timestamp.to_rfc3339(),
            ],
        )
        .with_context(|| format!("failed to record result for {}", outcome.test_name))?;
        Ok(())
    }

    /// All rows in insertion order, optionally only the latest `limit`.
    pub fn list_results(&self, limit: Option<usize>) -> Result<Vec<StoredOutcome>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT id, run_id, test_name, status, timestamp FROM (
                SELECT * FROM {table} ORDER BY id DESC LIMIT ?1
             ) ORDER BY id ASC",
            table = self.table
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([limit], |row| {
            let run_id: String = row.get(1)?;
            let status: String = row.get(3)?;
            let timestamp: String = row.get(4)?;
            Ok(StoredOutcome {
                id: row.get(0)?,
                run_id: Uuid::parse_str(&run_id).map_err(|e| conversion_error(1, e))?,
                outcome: TestOutcome {
                    test_name: row.get(2)?,
                    status: status.parse().map_err(|e| conversion_error(3, e))?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|t| t.with_timezone(&Utc))
                        .map_err(|e| conversion_error(4, e))?,
                },
            })
        })?;

        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }

    /// Latest recorded status per test name.
    pub fn latest_status(&self, test_name: &str) -> Result<Option<OutcomeStatus>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT status FROM {} WHERE test_name = ?1 ORDER BY id DESC LIMIT 1",
            self.table
        ))?;
        let mut rows = stmt.query([test_name])?;
        match rows.next()? {
            Some(row) => {
                let status: String = row.get(0)?;
                Ok(Some(status.parse()?))
            }
            None => Ok(None),
        }
    }
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
