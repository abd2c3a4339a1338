//! Database schema definitions and SQL constants.
//!
//! This module contains all SQL table definitions and indices of the loan
//! store.

/// Current schema version for the database.
///
/// This version is stored in the metadata table and is used to ensure
/// compatibility between the database and the application.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// SQL statement to create the metadata table.
pub const CREATE_METADATA_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )";

/// SQL statement to create the devices table.
pub const CREATE_DEVICES_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        brand TEXT NOT NULL,
        model TEXT NOT NULL,
        capacity_gb INTEGER NOT NULL CHECK (capacity_gb > 0),
        ram_gb INTEGER NOT NULL CHECK (ram_gb > 0),
        tier TEXT NOT NULL CHECK (tier IN ('high', 'low')),
        state TEXT NOT NULL DEFAULT 'available' CHECK (state IN ('available', 'loaned'))
    )";

/// SQL statement to create the requesters table.
pub const CREATE_REQUESTERS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS requesters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        tier_needed TEXT NOT NULL CHECK (tier_needed IN ('high', 'low')),
        holds_device INTEGER NOT NULL DEFAULT 0 CHECK (holds_device IN (0, 1))
    )";

/// SQL statement to create the reservations table.
///
/// Rows are never deleted; finished reservations keep a terminal status.
pub const CREATE_RESERVATIONS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS reservations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        requester_id INTEGER NOT NULL REFERENCES requesters(id),
        device_id INTEGER NOT NULL REFERENCES devices(id),
        status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'cancelled')),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )";

/// SQL statement to create the queue entries table.
///
/// `seq` breaks ties between entries enqueued in the same millisecond. A
/// requester appears at most once across both tiers.
pub const CREATE_QUEUE_ENTRIES_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS queue_entries (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        requester_id INTEGER NOT NULL UNIQUE REFERENCES requesters(id),
        tier TEXT NOT NULL CHECK (tier IN ('high', 'low')),
        enqueued_at INTEGER NOT NULL
    )";

/// At most one active reservation per device.
pub const CREATE_ACTIVE_DEVICE_INDEX: &str = r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_device
    ON reservations(device_id) WHERE status = 'active'";

/// At most one active reservation per requester.
pub const CREATE_ACTIVE_REQUESTER_INDEX: &str = r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_requester
    ON reservations(requester_id) WHERE status = 'active'";

/// Speeds up ordered scans of one tier's queue.
pub const CREATE_QUEUE_ORDER_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS idx_queue_entries_order
    ON queue_entries(tier, enqueued_at, seq)";

/// SQL statement to select the schema version from the metadata table.
pub const SELECT_SCHEMA_VERSION: &str = "SELECT value FROM metadata WHERE key = 'schema_version'";

/// SQL statement to insert or update the schema version in the metadata table.
pub const INSERT_SCHEMA_VERSION: &str =
    "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)";
