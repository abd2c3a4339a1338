//! Database layer for persistent storage of the loan engine.
//!
//! This module provides a SQLite-based store for devices, requesters,
//! reservations and queue entries, including connection management and
//! pooling, schema versioning, CRUD operations and the transactional
//! workflows the reservation manager drives.
//!
//! # Examples
//!
//! ```no_run
//! use loaner::database::{Database, DatabaseConfig};
//! use loaner::{NewDevice, NewRequester, Tier};
//! use std::time::SystemTime;
//!
//! let mut db = Database::open(DatabaseConfig::new("/tmp/loaner.db")).unwrap();
//! let device = db.register_device(&NewDevice::new("Dell", "XPS 13", 512, 16, Tier::High)).unwrap();
//! let requester = db.register_requester(&NewRequester::new("Ada", Tier::High)).unwrap();
//!
//! let commit = db.commit_reservation(device.id(), requester.id(), SystemTime::now()).unwrap();
//! println!("reservation {}", commit.reservation.id());
//! ```

mod config;
mod connection;
pub mod migrations;
mod operations;
mod pool;
mod schema;
#[cfg(test)]
pub(crate) mod test_util;
mod transaction;

pub use config::{
    database_path, default_data_dir, resolve_data_dir, DatabaseConfig, DATABASE_FILE_NAME,
    DATA_DIR_ENV,
};
pub use connection::Database;
pub use pool::{PoolConfig, PooledConnection, Store};
pub use schema::CURRENT_SCHEMA_VERSION;
pub use transaction::{EnqueueCommit, ReservationCommit, StatusCommit};

pub use migrations::{check_schema_compatibility, get_schema_version, initialize_schema};
