use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

const LAST_RUN_KEY: &str = "lastrun";

/// Key/value bookkeeping kept next to the schedule (`info(name, val)`)
#[derive(Clone)]
pub struct RunInfo {
    conn: Arc<Mutex<Connection>>,
}

impl RunInfo {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(crate) fn create_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS info (
                name TEXT PRIMARY KEY,
                val TEXT
            );",
        )
        .context("Failed to create info table")?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn last_run(&self) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT val FROM info WHERE name = ?1 LIMIT 1",
            rusqlite::params![LAST_RUN_KEY],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to read last run")
    }

    /// Store `timestamp` as the last run time. Returns true when no previous
    /// run had been recorded.
    pub async fn record_run(&self, timestamp: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let updated = conn
            .execute(
                "UPDATE info SET val = ?1 WHERE name = ?2",
                rusqlite::params![timestamp, LAST_RUN_KEY],
            )
            .context("Failed to update last run")?;

        if updated > 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO info (name, val) VALUES (?1, ?2)",
            rusqlite::params![LAST_RUN_KEY, timestamp],
        )
        .context("Failed to insert last run")?;
        Ok(true)
    }
}
