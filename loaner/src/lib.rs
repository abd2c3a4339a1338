#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # loaner
//!
//! A library for loaning a fixed pool of devices to requesters.
//!
//! Devices and requesters belong to one of two performance tiers. A
//! requester holds at most one device at a time; when no device of the
//! needed tier is free the requester waits in that tier's FIFO queue and is
//! served automatically when a device comes back.
//!
//! ## Core Types
//!
//! - [`ReservationManager`]: the orchestration engine, shared through `Arc`
//! - [`Store`] and [`Database`]: the transactional SQLite store
//! - [`Device`], [`Requester`], [`Reservation`], [`QueueEntry`]: the data model
//! - [`EventBus`] and [`ReservationEvent`]: typed change notifications
//! - [`WorkerPool`]: bounded background execution
//! - [`Error`] and [`Result`]: error handling types
//!
//! ## Examples
//!
//! ```no_run
//! use loaner::database::{DatabaseConfig, PoolConfig, Store};
//! use loaner::{EventBus, NewDevice, NewRequester, QueueOutcome, ReservationManager, Tier};
//!
//! let store = Store::open(DatabaseConfig::new("/tmp/loaner.db"), PoolConfig::default())?;
//! let manager = ReservationManager::load(store, EventBus::new())?;
//!
//! let laptop = manager.register_device(NewDevice::new("Lenovo", "T14", 512, 16, Tier::High))?;
//! let ada = manager.register_requester(NewRequester::new("Ada", Tier::High))?;
//! let bob = manager.register_requester(NewRequester::new("Bob", Tier::High))?;
//!
//! let loan = manager.create_reservation(laptop.id(), ada.id())?;
//! assert!(matches!(
//!     manager.add_to_queue(bob.id(), Tier::High)?,
//!     QueueOutcome::Enqueued { position: 0, .. }
//! ));
//!
//! // Returning the laptop hands it to Bob
//! manager.update_reservation_status(loan.id(), loaner::ReservationStatus::Completed)?;
//! assert_eq!(manager.queue_size(Tier::High), 0);
//! # Ok::<(), loaner::Error>(())
//! ```

pub mod config;
pub mod database;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod requester;
pub mod reservation;
pub mod tier;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigBuilder};
pub use database::{Database, DatabaseConfig, PoolConfig, Store};
pub use device::{Device, DeviceId, DeviceState, NewDevice};
pub use dispatch::WorkerPool;
pub use error::{Error, Result};
pub use events::{EventBus, EventListener, ListenerId, ReservationEvent};
pub use logging::{init_logger, LogLevel, Logger};
pub use manager::{QueueOutcome, ReservationManager, Violation};
pub use queue::{Queue, QueueEntry};
pub use requester::{NewRequester, Requester, RequesterId};
pub use reservation::{Reservation, ReservationId, ReservationStatus};
pub use tier::Tier;
