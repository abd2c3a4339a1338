//! Common test utilities for integration tests.
//!
//! This module provides an engine fixture over a temporary database and
//! builders for devices and requesters.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use loaner::database::{DatabaseConfig, PoolConfig, Store};
use loaner::{Device, EventBus, NewDevice, NewRequester, Requester, ReservationEvent, ReservationManager, Tier};

/// A manager over a temporary database that records every event.
pub struct TestEngine {
    /// The engine under test, shareable across threads.
    pub manager: Arc<ReservationManager>,
    /// Every event published so far, in order.
    pub events: Arc<Mutex<Vec<ReservationEvent>>>,
    dir: TempDir,
}

impl TestEngine {
    /// Creates an engine over a fresh database.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (manager, events) = Self::open_at(dir.path());
        Self {
            manager,
            events,
            dir,
        }
    }

    /// Opens another manager over the same database file.
    #[allow(dead_code)]
    pub fn reopen(&self) -> (Arc<ReservationManager>, Arc<Mutex<Vec<ReservationEvent>>>) {
        Self::open_at(self.dir.path())
    }

    /// Path of the database file.
    #[allow(dead_code)]
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("loaner.db")
    }

    fn open_at(dir: &Path) -> (Arc<ReservationManager>, Arc<Mutex<Vec<ReservationEvent>>>) {
        let store = Store::open(
            DatabaseConfig::new(dir.join("loaner.db")),
            PoolConfig {
                max_connections: 8,
                acquire_attempts: 50,
                ..PoolConfig::default()
            },
        )
        .unwrap();
        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.subscribe(move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });
        (
            Arc::new(ReservationManager::load(store, bus).unwrap()),
            events,
        )
    }

    /// Registers a device of `tier`.
    pub fn device(&self, tier: Tier) -> Device {
        let new_device = match tier {
            Tier::High => NewDevice::new("Dell", "Precision 5570", 1024, 32, Tier::High),
            Tier::Low => NewDevice::new("Acer", "Chromebook 314", 64, 4, Tier::Low),
        };
        self.manager.register_device(new_device).unwrap()
    }

    /// Registers a requester needing `tier`.
    pub fn requester(&self, name: &str, tier: Tier) -> Requester {
        self.manager
            .register_requester(NewRequester::new(name, tier))
            .unwrap()
    }

    /// Number of recorded events matching `pred`.
    #[allow(dead_code)]
    pub fn count_events(&self, pred: impl Fn(&ReservationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Asserts that the audit finds nothing wrong.
    pub fn assert_consistent(&self) {
        let violations = self.manager.verify_consistency().unwrap();
        assert!(violations.is_empty(), "violations: {violations:?}");
    }
}
