//! The reservation manager: orchestration of loans and waitlists.
//!
//! [`ReservationManager`] owns write-through caches of devices, requesters
//! and active reservations plus one [`Queue`] per tier. Every workflow
//! validates against the caches, commits one store transaction, then
//! mirrors the committed rows into the caches and finally publishes events.
//!
//! Cached rows carry the commit stamp of the transaction that wrote them
//! (see [`Database::last_commit`]); a mirror older than the cached row is
//! dropped, so caches converge on the latest commit whatever order the
//! committing threads mirror in.
//!
//! Locks:
//!
//! - No cache lock is held while the store is called or events are
//!   published. When several caches are written together the order is
//!   devices, then requesters, then active reservations.
//! - Each tier has a write gate held across every store call that adds or
//!   removes queue rows of that tier and the matching in-memory mirror, so
//!   queue mirrors apply in store order. A gate is taken before any other
//!   lock or connection, at most one gate at a time, and is released before
//!   events are published.

mod audit;
mod queueing;
mod reservations;

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::{Mutex, RwLock};

use crate::database::{Database, Store};
use crate::device::{Device, DeviceId, NewDevice};
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::queue::{Queue, QueueEntry};
use crate::requester::{NewRequester, Requester, RequesterId};
use crate::reservation::{Reservation, ReservationId};
use crate::Tier;

pub use audit::Violation;
pub use queueing::QueueOutcome;

/// Coordinates devices, requesters, reservations and the tier queues.
///
/// The manager is `Send + Sync`; share it through `Arc`.
///
/// # Examples
///
/// ```no_run
/// use loaner::database::{DatabaseConfig, PoolConfig, Store};
/// use loaner::{EventBus, NewDevice, NewRequester, ReservationManager, Tier};
///
/// let store = Store::open(DatabaseConfig::new("/tmp/loaner.db"), PoolConfig::default()).unwrap();
/// let manager = ReservationManager::load(store, EventBus::new()).unwrap();
///
/// let device = manager.register_device(NewDevice::new("Dell", "XPS 15", 1024, 32, Tier::High)).unwrap();
/// let ada = manager.register_requester(NewRequester::new("Ada", Tier::High)).unwrap();
/// let reservation = manager.create_reservation(device.id(), ada.id()).unwrap();
/// assert!(reservation.is_active());
/// ```
#[derive(Debug)]
pub struct ReservationManager {
    store: Store,
    events: EventBus,
    devices: RwLock<HashMap<DeviceId, Cached<Device>>>,
    requesters: RwLock<HashMap<RequesterId, Cached<Requester>>>,
    active: RwLock<HashMap<ReservationId, Reservation>>,
    high_queue: Queue,
    low_queue: Queue,
    high_writes: Mutex<()>,
    low_writes: Mutex<()>,
}

/// A cached row with the stamp of the commit that produced it.
#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    stamp: u64,
}

/// Writes `value` unless the cache already holds a later commit of `key`.
///
/// Returns whether the value was written.
fn mirror<K: Eq + Hash, T>(
    map: &mut HashMap<K, Cached<T>>,
    key: K,
    value: T,
    stamp: u64,
) -> bool {
    match map.get(&key) {
        Some(cached) if cached.stamp > stamp => false,
        _ => {
            map.insert(key, Cached { value, stamp });
            true
        }
    }
}

impl ReservationManager {
    /// Builds a manager whose caches reflect the current store content.
    ///
    /// Loads all devices and requesters, the active reservations and both
    /// queues in stored order. No events are published while loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: Store, events: EventBus) -> Result<Self> {
        let (devices, requesters, active, high, low) = store.with_connection(|db| {
            let conn = db.connection();
            Ok((
                Database::list_devices(conn)?,
                Database::list_requesters(conn)?,
                Database::list_active_reservations(conn)?,
                Database::list_queue(conn, Tier::High)?,
                Database::list_queue(conn, Tier::Low)?,
            ))
        })?;

        log::debug!(
            "loaded {} devices, {} requesters, {} active reservations, {}+{} queued",
            devices.len(),
            requesters.len(),
            active.len(),
            high.len(),
            low.len()
        );

        let high_queue = Queue::new(Tier::High, events.clone());
        high_queue.load(high);
        let low_queue = Queue::new(Tier::Low, events.clone());
        low_queue.load(low);

        Ok(Self {
            store,
            events,
            devices: RwLock::new(
                devices
                    .into_iter()
                    .map(|d| (d.id(), Cached { value: d, stamp: 0 }))
                    .collect(),
            ),
            requesters: RwLock::new(
                requesters
                    .into_iter()
                    .map(|r| (r.id(), Cached { value: r, stamp: 0 }))
                    .collect(),
            ),
            active: RwLock::new(active.into_iter().map(|r| (r.id(), r)).collect()),
            high_queue,
            low_queue,
            high_writes: Mutex::new(()),
            low_writes: Mutex::new(()),
        })
    }

    /// Returns the event bus this manager publishes to.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Provisions a device and serves the head of its tier queue with it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a persistence error.
    /// A failed follow-up assignment is logged, not returned.
    pub fn register_device(&self, new_device: NewDevice) -> Result<Device> {
        new_device.validate()?;
        let (device, stamp) = self.persist("register device", |db| {
            let device = db.register_device(&new_device)?;
            Ok((device, db.last_commit()))
        })?;
        mirror(&mut self.devices.write(), device.id(), device.clone(), stamp);
        log::info!(
            "registered device {} ({} {}, {})",
            device.id(),
            device.brand(),
            device.model(),
            device.tier()
        );

        if let Err(e) = self.assign_next_from_queue(device.id()) {
            log::warn!("new device {} could not be assigned: {e}", device.id());
        }
        Ok(self.device(device.id()).unwrap_or(device))
    }

    /// Provisions a requester.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a persistence error.
    pub fn register_requester(&self, new_requester: NewRequester) -> Result<Requester> {
        new_requester.validate()?;
        let (requester, stamp) = self.persist("register requester", |db| {
            let requester = db.register_requester(&new_requester)?;
            Ok((requester, db.last_commit()))
        })?;
        mirror(
            &mut self.requesters.write(),
            requester.id(),
            requester.clone(),
            stamp,
        );
        log::info!(
            "registered requester {} ({}, needs {})",
            requester.id(),
            requester.name(),
            requester.tier_needed()
        );
        Ok(requester)
    }

    // ---- queries ----

    /// Returns a cached device.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.read().get(&id).map(|c| c.value.clone())
    }

    /// Returns a cached requester.
    #[must_use]
    pub fn requester(&self, id: RequesterId) -> Option<Requester> {
        self.requesters.read().get(&id).map(|c| c.value.clone())
    }

    /// Returns a reservation of any status, from the cache or the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        if let Some(reservation) = self.active.read().get(&id).cloned() {
            return Ok(Some(reservation));
        }
        self.store
            .with_connection(|db| Database::get_reservation(db.connection(), id))
    }

    /// Returns all devices ordered by id.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<_> = self
            .devices
            .read()
            .values()
            .map(|c| c.value.clone())
            .collect();
        devices.sort_by_key(Device::id);
        devices
    }

    /// Returns available devices of `tier` ordered by id.
    #[must_use]
    pub fn available_devices(&self, tier: Tier) -> Vec<Device> {
        let mut devices: Vec<_> = self
            .devices
            .read()
            .values()
            .map(|c| &c.value)
            .filter(|d| d.tier() == tier && d.is_available())
            .cloned()
            .collect();
        devices.sort_by_key(Device::id);
        devices
    }

    /// Returns all requesters ordered by id.
    #[must_use]
    pub fn requesters(&self) -> Vec<Requester> {
        let mut requesters: Vec<_> = self
            .requesters
            .read()
            .values()
            .map(|c| c.value.clone())
            .collect();
        requesters.sort_by_key(Requester::id);
        requesters
    }

    /// Returns the active reservations ordered by id.
    #[must_use]
    pub fn active_reservations(&self) -> Vec<Reservation> {
        let mut active: Vec<_> = self.active.read().values().cloned().collect();
        active.sort_by_key(Reservation::id);
        active
    }

    /// Returns every reservation ever made, from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn reservation_history(&self) -> Result<Vec<Reservation>> {
        self.store
            .with_connection(|db| Database::list_all_reservations(db.connection()))
    }

    /// Returns a copy of the queue of `tier` in dequeue order.
    #[must_use]
    pub fn queue_snapshot(&self, tier: Tier) -> Vec<QueueEntry> {
        self.queue(tier).snapshot()
    }

    /// Returns the number of requesters waiting in `tier`.
    #[must_use]
    pub fn queue_size(&self, tier: Tier) -> usize {
        self.queue(tier).size()
    }

    /// Returns where `requester_id` waits, as a tier and 0-based position.
    #[must_use]
    pub fn queue_position(&self, requester_id: RequesterId) -> Option<(Tier, usize)> {
        Tier::ALL.into_iter().find_map(|tier| {
            self.queue(tier)
                .position(requester_id)
                .map(|position| (tier, position))
        })
    }

    // ---- internals ----

    const fn queue(&self, tier: Tier) -> &Queue {
        match tier {
            Tier::High => &self.high_queue,
            Tier::Low => &self.low_queue,
        }
    }

    /// The write gate of `tier`; see the module docs.
    const fn queue_writes(&self, tier: Tier) -> &Mutex<()> {
        match tier {
            Tier::High => &self.high_writes,
            Tier::Low => &self.low_writes,
        }
    }

    /// Runs a store call, reporting persistence failures.
    fn persist<T, F>(&self, action: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T>,
    {
        self.store
            .with_connection(f)
            .map_err(|e| self.report(action, e))
    }

    /// Logs a workflow failure; persistence failures are also published.
    fn report(&self, action: &str, err: Error) -> Error {
        if err.is_persistence() {
            log::error!("{action} failed: {err}");
            self.events.publish_error(format!("{action} failed"), &err);
        } else {
            log::debug!("{action} rejected: {err}");
        }
        err
    }

    fn unknown_device(id: DeviceId) -> Error {
        Error::validation("device", format!("unknown device {id}"))
    }

    fn unknown_requester(id: RequesterId) -> Error {
        Error::validation("requester", format!("unknown requester {id}"))
    }
}
