//! Database connection management.
//!
//! This module provides the connection type with the PRAGMA settings the
//! loan store relies on: WAL for concurrent readers, a busy timeout for
//! writers and enforced foreign keys.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags};

use crate::error::{Error, Result};

use super::config::DatabaseConfig;

/// A database connection wrapper with configuration.
///
/// # Examples
///
/// ```no_run
/// use loaner::database::{Database, DatabaseConfig};
///
/// let config = DatabaseConfig::new("/tmp/loaner.db");
/// let db = Database::open(config).unwrap();
/// ```
#[derive(Debug)]
pub struct Database {
    pub(super) conn: Connection,
    config: DatabaseConfig,
    pub(super) clock: Arc<AtomicU64>,
    pub(super) last_commit: u64,
}

impl Database {
    /// Opens a database connection with the given configuration.
    ///
    /// Creates the parent directory when `auto_create` is set, applies the
    /// pragmas and initializes or verifies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is missing and `auto_create` is off
    /// - The file cannot be opened or the directory cannot be created
    /// - PRAGMA settings cannot be applied
    /// - The stored schema version is unsupported
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.auto_create {
                return Err(Error::not_found(format!(
                    "database {}",
                    config.path.display()
                )));
            }
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let flags = if config.auto_create {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };

        let conn = Connection::open_with_flags(&config.path, flags)?;
        conn.busy_timeout(config.busy_timeout)?;

        // journal_mode answers with a row
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")?;

        super::migrations::check_schema_compatibility(&conn)?;

        Ok(Self {
            conn,
            config,
            clock: Arc::new(AtomicU64::new(0)),
            last_commit: 0,
        })
    }

    /// Makes this connection draw commit stamps from `clock`.
    ///
    /// Connections sharing a clock produce stamps in commit order.
    pub(super) fn with_commit_clock(mut self, clock: Arc<AtomicU64>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the stamp of the last transaction committed on this
    /// connection, or 0 if none has been.
    ///
    /// Stamps increase in commit order across every connection of a
    /// [`Store`](super::Store), so a larger stamp means a later write.
    #[must_use]
    pub const fn last_commit(&self) -> u64 {
        self.last_commit
    }

    /// Returns the configuration this connection was opened with.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns a reference to the underlying `SQLite` connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns a mutable reference to the underlying `SQLite` connection.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
