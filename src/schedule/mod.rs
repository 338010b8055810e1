pub mod info;
pub mod lookup;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub use lookup::Departure;

/// Tables of the schedule store (trains, stations, times).
#[cfg(test)]
const SCHEDULE_SCHEMA: &str = include_str!("schema.sql");

/// Handle on the SQLite schedule store, opened once at startup and
/// shared by every lookup.
#[derive(Clone)]
pub struct ScheduleStore {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleStore {
    /// Open an existing schedule database. A missing file is an error: the
    /// store is provisioned externally and never created here.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!(
                "Database path \"{}\" does not exist or is not readable",
                path.display()
            );
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Only the bookkeeping table is ours to create
        info::RunInfo::create_table(&conn)?;

        info!("Schedule store opened at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database with the full schedule schema (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEDULE_SCHEMA)
            .context("Failed to create schedule schema")?;
        info::RunInfo::create_table(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared connection handle, for stores layered on the same database
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}
