//! Database CRUD operations for devices, requesters, reservations and
//! queue entries.
//!
//! Every `*_simple` function takes a plain [`Connection`] and opens no
//! transaction of its own, so it can run either standalone or inside
//! [`Database::with_transaction`]. Readers are associated functions taking a
//! connection for the same reason.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::device::{Device, DeviceId, DeviceState, NewDevice};
use crate::error::{Error, Result};
use crate::queue::QueueEntry;
use crate::requester::{NewRequester, Requester, RequesterId};
use crate::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::Tier;

use super::connection::Database;

/// Converts a `SystemTime` to Unix epoch milliseconds for database storage.
///
/// # Errors
///
/// Returns an error if the time is before the Unix epoch.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(super) fn systemtime_to_unix_millis(time: SystemTime) -> Result<i64> {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| Error::validation("timestamp", format!("invalid timestamp: {e}")))
        .map(|d| d.as_millis() as i64)
}

/// Converts Unix epoch milliseconds from the database to a `SystemTime`.
#[allow(clippy::cast_sign_loss)]
pub(super) fn unix_millis_to_systemtime(millis: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(millis.max(0) as u64)
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const DEVICE_COLUMNS: &str = "id, brand, model, capacity_gb, ram_gb, tier, state";

/// Expects row fields in the order of `DEVICE_COLUMNS`.
fn row_to_device(row: &Row<'_>) -> rusqlite::Result<Device> {
    let new_device = NewDevice {
        brand: row.get(1)?,
        model: row.get(2)?,
        capacity_gb: row.get(3)?,
        ram_gb: row.get(4)?,
        tier: parse_column::<Tier>(row, 5)?,
    };
    Ok(Device::from_parts(
        DeviceId(row.get(0)?),
        new_device,
        parse_column::<DeviceState>(row, 6)?,
    ))
}

const REQUESTER_COLUMNS: &str = "id, name, tier_needed, holds_device";

fn row_to_requester(row: &Row<'_>) -> rusqlite::Result<Requester> {
    let new_requester = NewRequester {
        name: row.get(1)?,
        tier_needed: parse_column::<Tier>(row, 2)?,
    };
    Ok(Requester::from_parts(
        RequesterId(row.get(0)?),
        new_requester,
        row.get(3)?,
    ))
}

const RESERVATION_COLUMNS: &str = "id, device_id, requester_id, status, created_at, updated_at";

fn row_to_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Reservation::builder(
        ReservationId(row.get(0)?),
        DeviceId(row.get(1)?),
        RequesterId(row.get(2)?),
    )
    .status(parse_column::<ReservationStatus>(row, 3)?)
    .created_at(unix_millis_to_systemtime(row.get(4)?))
    .updated_at(unix_millis_to_systemtime(row.get(5)?))
    .build()
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Integer, Box::new(e)))
}

const QUEUE_COLUMNS: &str = "seq, requester_id, tier, enqueued_at";

fn row_to_queue_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        seq: row.get(0)?,
        requester_id: RequesterId(row.get(1)?),
        tier: parse_column::<Tier>(row, 2)?,
        enqueued_at: unix_millis_to_systemtime(row.get(3)?),
    })
}

// Conditional writes: zero affected rows means the expected value was stale.
const UPDATE_DEVICE_STATE: &str = "UPDATE devices SET state = ?1 WHERE id = ?2 AND state = ?3";
const UPDATE_HOLDS_DEVICE: &str =
    "UPDATE requesters SET holds_device = ?1 WHERE id = ?2 AND holds_device = ?3";
const UPDATE_RESERVATION_STATUS: &str =
    "UPDATE reservations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4";

impl Database {
    // ---- devices ----

    /// Inserts a device in state `available` and returns it with its id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a database error if the
    /// insert fails.
    pub fn insert_device_simple(conn: &Connection, new_device: &NewDevice) -> Result<Device> {
        new_device.validate()?;
        conn.execute(
            "INSERT INTO devices (brand, model, capacity_gb, ram_gb, tier, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new_device.brand,
                new_device.model,
                new_device.capacity_gb,
                new_device.ram_gb,
                new_device.tier.as_str(),
                DeviceState::Available.as_str(),
            ],
        )?;
        Ok(Device::from_parts(
            DeviceId(conn.last_insert_rowid()),
            new_device.clone(),
            DeviceState::Available,
        ))
    }

    /// Retrieves a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_device(conn: &Connection, id: DeviceId) -> Result<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1");
        Ok(conn
            .query_row(&sql, [id.0], row_to_device)
            .optional()?)
    }

    /// Lists all devices ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_devices(conn: &Connection) -> Result<Vec<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let devices = stmt
            .query_map([], row_to_device)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    /// Moves a device from `from` to `to` if it is still in `from`.
    ///
    /// Returns `false` when the row did not match.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_device_state_simple(
        conn: &Connection,
        id: DeviceId,
        from: DeviceState,
        to: DeviceState,
    ) -> Result<bool> {
        let rows = conn.execute(UPDATE_DEVICE_STATE, params![to.as_str(), id.0, from.as_str()])?;
        Ok(rows > 0)
    }

    // ---- requesters ----

    /// Inserts a requester that holds no device and returns it with its id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a database error if the
    /// insert fails.
    pub fn insert_requester_simple(
        conn: &Connection,
        new_requester: &NewRequester,
    ) -> Result<Requester> {
        new_requester.validate()?;
        conn.execute(
            "INSERT INTO requesters (name, tier_needed, holds_device) VALUES (?1, ?2, 0)",
            params![new_requester.name, new_requester.tier_needed.as_str()],
        )?;
        Ok(Requester::from_parts(
            RequesterId(conn.last_insert_rowid()),
            new_requester.clone(),
            false,
        ))
    }

    /// Retrieves a requester.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_requester(conn: &Connection, id: RequesterId) -> Result<Option<Requester>> {
        let sql = format!("SELECT {REQUESTER_COLUMNS} FROM requesters WHERE id = ?1");
        Ok(conn
            .query_row(&sql, [id.0], row_to_requester)
            .optional()?)
    }

    /// Lists all requesters ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_requesters(conn: &Connection) -> Result<Vec<Requester>> {
        let sql = format!("SELECT {REQUESTER_COLUMNS} FROM requesters ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let requesters = stmt
            .query_map([], row_to_requester)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requesters)
    }

    /// Flips `holds_device` to `to` if it currently differs.
    ///
    /// Returns `false` when the row did not match.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_holds_device_simple(conn: &Connection, id: RequesterId, to: bool) -> Result<bool> {
        let rows = conn.execute(UPDATE_HOLDS_DEVICE, params![to, id.0, !to])?;
        Ok(rows > 0)
    }

    // ---- reservations ----

    /// Inserts an active reservation stamped at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert violates a constraint (for example a
    /// second active reservation on the device) or fails otherwise.
    pub fn insert_reservation_simple(
        conn: &Connection,
        device_id: DeviceId,
        requester_id: RequesterId,
        at: SystemTime,
    ) -> Result<Reservation> {
        let millis = systemtime_to_unix_millis(at)?;
        conn.execute(
            "INSERT INTO reservations (requester_id, device_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                requester_id.0,
                device_id.0,
                ReservationStatus::Active.as_str(),
                millis
            ],
        )?;
        // Read back so the cached copy carries the stored precision
        let id = ReservationId(conn.last_insert_rowid());
        Self::get_reservation(conn, id)?
            .ok_or_else(|| Error::not_found(format!("reservation {id}")))
    }

    /// Retrieves a reservation of any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_reservation(conn: &Connection, id: ReservationId) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
        Ok(conn
            .query_row(&sql, [id.0], row_to_reservation)
            .optional()?)
    }

    /// Lists reservations in status `active`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_active_reservations(conn: &Connection) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE status = 'active' ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let reservations = stmt
            .query_map([], row_to_reservation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reservations)
    }

    /// Lists every reservation ever made, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_all_reservations(conn: &Connection) -> Result<Vec<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let reservations = stmt
            .query_map([], row_to_reservation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reservations)
    }

    /// Writes `to` if the stored status is still `from`.
    ///
    /// Returns `false` when the row did not match.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_reservation_status_simple(
        conn: &Connection,
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        at: SystemTime,
    ) -> Result<bool> {
        let millis = systemtime_to_unix_millis(at)?;
        let rows = conn.execute(
            UPDATE_RESERVATION_STATUS,
            params![to.as_str(), millis, id.0, from.as_str()],
        )?;
        Ok(rows > 0)
    }

    // ---- queue entries ----

    /// Appends a queue entry unless the requester is already queued.
    ///
    /// Returns `None` when the unique requester constraint ignored the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_queue_entry_simple(
        conn: &Connection,
        requester_id: RequesterId,
        tier: Tier,
        at: SystemTime,
    ) -> Result<Option<QueueEntry>> {
        let millis = systemtime_to_unix_millis(at)?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO queue_entries (requester_id, tier, enqueued_at)
             VALUES (?1, ?2, ?3)",
            params![requester_id.0, tier.as_str(), millis],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(QueueEntry {
            seq: conn.last_insert_rowid(),
            requester_id,
            tier,
            enqueued_at: unix_millis_to_systemtime(millis),
        }))
    }

    /// Re-inserts a previously removed entry with its original `seq` and
    /// timestamp.
    ///
    /// Returns `false` if the requester was queued again meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn restore_queue_entry_simple(conn: &Connection, entry: &QueueEntry) -> Result<bool> {
        let millis = systemtime_to_unix_millis(entry.enqueued_at)?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO queue_entries (seq, requester_id, tier, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.seq, entry.requester_id.0, entry.tier.as_str(), millis],
        )?;
        Ok(rows > 0)
    }

    /// Finds the entry of a requester in either tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_queue_entry(
        conn: &Connection,
        requester_id: RequesterId,
    ) -> Result<Option<QueueEntry>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE requester_id = ?1");
        Ok(conn
            .query_row(&sql, [requester_id.0], row_to_queue_entry)
            .optional()?)
    }

    /// Lists the entries of one tier in dequeue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_queue(conn: &Connection, tier: Tier) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE tier = ?1 ORDER BY enqueued_at, seq"
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([tier.as_str()], row_to_queue_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Deletes the entry of `requester_id` in `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_queue_entry_simple(
        conn: &Connection,
        requester_id: RequesterId,
        tier: Tier,
    ) -> Result<bool> {
        let rows = conn.execute(
            "DELETE FROM queue_entries WHERE requester_id = ?1 AND tier = ?2",
            params![requester_id.0, tier.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Deletes and returns the entry of `requester_id`, whatever its tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or delete fails.
    pub fn take_queue_entry_simple(
        conn: &Connection,
        requester_id: RequesterId,
    ) -> Result<Option<QueueEntry>> {
        let entry = Self::find_queue_entry(conn, requester_id)?;
        if let Some(entry) = &entry {
            conn.execute("DELETE FROM queue_entries WHERE seq = ?1", [entry.seq])?;
        }
        Ok(entry)
    }

    /// Deletes and returns the head of `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or delete fails.
    pub fn pop_queue_front_simple(conn: &Connection, tier: Tier) -> Result<Option<QueueEntry>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE tier = ?1
             ORDER BY enqueued_at, seq LIMIT 1"
        );
        let head = conn
            .query_row(&sql, [tier.as_str()], row_to_queue_entry)
            .optional()?;
        if let Some(entry) = &head {
            conn.execute("DELETE FROM queue_entries WHERE seq = ?1", [entry.seq])?;
        }
        Ok(head)
    }

    /// Deletes every entry of `tier`, returning them in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or delete fails.
    pub fn clear_queue_simple(conn: &Connection, tier: Tier) -> Result<Vec<QueueEntry>> {
        let entries = Self::list_queue(conn, tier)?;
        conn.execute("DELETE FROM queue_entries WHERE tier = ?1", [tier.as_str()])?;
        Ok(entries)
    }
}
