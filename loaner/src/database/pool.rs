//! Pooled access to the loan store.
//!
//! [`Store`] hands out [`Database`] connections, opening new ones lazily up
//! to a fixed maximum. Acquisition retries transient failures (a full pool,
//! a failed open) with capped exponential backoff and then gives up with
//! [`Error::ConnectionUnavailable`]. Business logic never retries.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::config::DatabaseConfig;
use super::connection::Database;

/// Sizing and retry policy of a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections.
    pub max_connections: usize,
    /// Attempts before acquisition fails.
    pub acquire_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap on the delay between attempts.
    pub max_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_attempts: 5,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(1000),
        }
    }
}

impl PoolConfig {
    /// Delay after the given failed attempt (1-based), doubling each time.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use loaner::database::PoolConfig;
    ///
    /// let config = PoolConfig {
    ///     initial_backoff: Duration::from_millis(10),
    ///     max_backoff: Duration::from_millis(50),
    ///     ..PoolConfig::default()
    /// };
    /// assert_eq!(config.backoff_delay(1), Duration::from_millis(10));
    /// assert_eq!(config.backoff_delay(3), Duration::from_millis(40));
    /// assert_eq!(config.backoff_delay(9), Duration::from_millis(50));
    /// ```
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

#[derive(Debug, Default)]
struct Slots {
    idle: Vec<Database>,
    open: usize,
}

/// A pool of connections to one database file.
///
/// # Examples
///
/// ```no_run
/// use loaner::database::{DatabaseConfig, PoolConfig, Store};
///
/// let store = Store::open(DatabaseConfig::new("/tmp/loaner.db"), PoolConfig::default()).unwrap();
/// let conn = store.acquire().unwrap();
/// let devices = loaner::Database::list_devices(conn.connection()).unwrap();
/// ```
#[derive(Debug)]
pub struct Store {
    db_config: DatabaseConfig,
    pool_config: PoolConfig,
    slots: Mutex<Slots>,
    clock: Arc<AtomicU64>,
}

impl Store {
    /// Opens the store, eagerly opening one connection so schema problems
    /// surface here.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection cannot be opened or the
    /// pool configuration is unusable.
    pub fn open(db_config: DatabaseConfig, pool_config: PoolConfig) -> Result<Self> {
        if pool_config.max_connections == 0 {
            return Err(Error::validation(
                "pool.max_connections",
                "must be greater than 0",
            ));
        }
        if pool_config.acquire_attempts == 0 {
            return Err(Error::validation(
                "pool.acquire_attempts",
                "must be greater than 0",
            ));
        }

        let clock = Arc::new(AtomicU64::new(0));
        let first = Database::open(db_config.clone())?.with_commit_clock(Arc::clone(&clock));
        log::debug!(
            "opened store at {} (max {} connections)",
            db_config.path.display(),
            pool_config.max_connections
        );

        Ok(Self {
            db_config,
            pool_config,
            slots: Mutex::new(Slots {
                idle: vec![first],
                open: 1,
            }),
            clock,
        })
    }

    /// Returns the database configuration.
    #[must_use]
    pub const fn database_config(&self) -> &DatabaseConfig {
        &self.db_config
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Returns the number of currently open connections.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.slots.lock().open
    }

    /// Acquires a connection, retrying with backoff.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionUnavailable`] once every attempt failed, or
    /// a non-transient open error (such as an unsupported schema) at once.
    pub fn acquire(&self) -> Result<PooledConnection<'_>> {
        let attempts = self.pool_config.acquire_attempts;
        for attempt in 1..=attempts {
            match self.try_acquire() {
                Ok(Some(db)) => {
                    return Ok(PooledConnection {
                        store: self,
                        db: Some(db),
                    })
                }
                Ok(None) => log::debug!("connection pool exhausted (attempt {attempt}/{attempts})"),
                Err(e) if is_transient(&e) => {
                    log::warn!("opening connection failed (attempt {attempt}/{attempts}): {e}");
                }
                Err(e) => return Err(e),
            }
            if attempt < attempts {
                thread::sleep(self.pool_config.backoff_delay(attempt));
            }
        }
        Err(Error::ConnectionUnavailable { attempts })
    }

    /// Runs `f` with a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns acquisition errors or the error of `f`.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T>,
    {
        let mut conn = self.acquire()?;
        f(&mut conn)
    }

    fn try_acquire(&self) -> Result<Option<Database>> {
        {
            let mut slots = self.slots.lock();
            if let Some(db) = slots.idle.pop() {
                return Ok(Some(db));
            }
            if slots.open >= self.pool_config.max_connections {
                return Ok(None);
            }
            // Reserve the slot, open outside the lock
            slots.open += 1;
        }

        match Database::open(self.db_config.clone()) {
            Ok(db) => Ok(Some(db.with_commit_clock(Arc::clone(&self.clock)))),
            Err(e) => {
                self.slots.lock().open -= 1;
                Err(e)
            }
        }
    }

    fn release(&self, db: Database) {
        let mut slots = self.slots.lock();
        if db.connection().is_autocommit() {
            slots.idle.push(db);
        } else {
            // Never hand out a connection stuck inside a transaction
            slots.open -= 1;
            log::warn!("discarding pooled connection left inside a transaction");
        }
    }
}

fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Database(_) | Error::Io(_))
}

/// A connection borrowed from a [`Store`], returned on drop.
#[derive(Debug)]
pub struct PooledConnection<'a> {
    store: &'a Store,
    db: Option<Database>,
}

impl Deref for PooledConnection<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        // Only `drop` takes the connection out
        self.db.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(db) = self.db.take() {
            self.store.release(db);
        }
    }
}
