//! SQLite implementation of [`Persistence`](super::Persistence).

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use super::{rows, Persistence};
use crate::config::PersistenceConfig;
use crate::error::{log_persistence_failure, Result};

/// SQLite-backed executor holding a single serialized connection.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqlitePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistence")
            .field("path", &self.path)
            .finish()
    }
}

impl SqlitePersistence {
    /// Opens (creating if needed) a database file and applies the pragmas
    /// from `config`.
    pub fn open(path: impl AsRef<Path>, config: &PersistenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        conn.busy_timeout(config.busy_timeout())?;
        conn.pragma_update(None, "synchronous", config.synchronous.pragma_value())?;
        if config.wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "journal mode set");
        }
        rows::ensure_schema(&conn)?;

        debug!(path = %path.display(), "opened sqlite persistence");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Volatile database, mainly for tests and scratch graphs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        rows::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Persistence for SqlitePersistence {
    fn execute<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock();
        op(&conn).map_err(|err| {
            log_persistence_failure("sqlite", &err);
            err.into()
        })
    }
}
