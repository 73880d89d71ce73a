//! SQLite persistence for Ceridwen.
//!
//! Two repositories share one database file:
//!
//! - [`RunStore`] — the run rows the orchestration engine reads and
//!   rewrites after every step transition. Updates are optimistic: each
//!   row carries a version and a stale write surfaces as
//!   [`StoreError::Conflict`] instead of silently clobbering.
//! - [`LimitStore`] — the append-only rate-limit event log plus the daily
//!   reporting rollup. The check-and-record primitive is a single
//!   transaction so counting and consuming quota cannot race.

pub mod error;
pub mod limit_store;
pub mod run_store;

pub use error::{Result, StoreError};
pub use limit_store::{DailyTotals, LimitStore, WindowCheck};
pub use run_store::{RunRecord, RunStore};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Shared handle to one open SQLite database.
///
/// Both repositories clone this handle; a `Mutex<Connection>` keeps the
/// single writer honest across threads.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        embedded::migrations::runner()
            .run(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for use. Panics if poisoned.
    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}
