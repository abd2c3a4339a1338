//! Shared test utilities for database unit tests.

use tempfile::TempDir;

use crate::database::{Database, DatabaseConfig};
use crate::{NewDevice, NewRequester, Tier};

/// A database in its own temporary directory, removed on drop.
pub struct TestDatabase {
    db: Database,
    _dir: TempDir,
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

impl std::ops::DerefMut for TestDatabase {
    fn deref_mut(&mut self) -> &mut Database {
        &mut self.db
    }
}

/// Creates a temporary test database.
///
/// # Panics
///
/// Panics if the temporary directory or database cannot be created.
#[must_use]
pub fn create_test_database() -> TestDatabase {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(DatabaseConfig::new(dir.path().join("test.db"))).unwrap();
    TestDatabase { db, _dir: dir }
}

/// A valid device of `tier`.
#[must_use]
pub fn sample_device(tier: Tier) -> NewDevice {
    match tier {
        Tier::High => NewDevice::new("Dell", "XPS 15", 1024, 32, tier),
        Tier::Low => NewDevice::new("Acer", "Aspire 3", 256, 8, tier),
    }
}

/// A valid requester needing `tier`.
#[must_use]
pub fn sample_requester(name: &str, tier: Tier) -> NewRequester {
    NewRequester::new(name, tier)
}
