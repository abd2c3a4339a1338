//! Database schema management and migrations.
//!
//! This module handles database schema initialization and version checking.

use rusqlite::Connection;

use crate::error::{Error, Result};

use super::schema::{
    CREATE_ACTIVE_DEVICE_INDEX, CREATE_ACTIVE_REQUESTER_INDEX, CREATE_DEVICES_TABLE,
    CREATE_METADATA_TABLE, CREATE_QUEUE_ENTRIES_TABLE, CREATE_QUEUE_ORDER_INDEX,
    CREATE_REQUESTERS_TABLE, CREATE_RESERVATIONS_TABLE, CURRENT_SCHEMA_VERSION,
    INSERT_SCHEMA_VERSION, SELECT_SCHEMA_VERSION,
};

/// Initializes the database schema.
///
/// Creates all tables, indices and the version record in one batch.
///
/// # Errors
///
/// Returns an error if any SQL statement fails to execute.
///
/// # Examples
///
/// ```
/// use rusqlite::Connection;
/// use loaner::database::migrations::{get_schema_version, initialize_schema};
///
/// let conn = Connection::open_in_memory().unwrap();
/// initialize_schema(&conn).unwrap();
/// assert_eq!(get_schema_version(&conn).unwrap(), 1);
/// ```
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in [
        CREATE_METADATA_TABLE,
        CREATE_DEVICES_TABLE,
        CREATE_REQUESTERS_TABLE,
        CREATE_RESERVATIONS_TABLE,
        CREATE_QUEUE_ENTRIES_TABLE,
        CREATE_ACTIVE_DEVICE_INDEX,
        CREATE_ACTIVE_REQUESTER_INDEX,
        CREATE_QUEUE_ORDER_INDEX,
    ] {
        conn.execute(statement, [])?;
    }

    conn.execute(INSERT_SCHEMA_VERSION, [CURRENT_SCHEMA_VERSION.to_string()])?;
    Ok(())
}

/// Gets the current schema version from the database.
///
/// Returns `Ok(0)` for a database that has never been initialized.
///
/// # Errors
///
/// Returns an error if the query fails for any other reason or the stored
/// version is not an integer.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let has_metadata: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
        [],
        |row| row.get(0),
    )?;
    if !has_metadata {
        return Ok(0);
    }

    match conn.query_row(SELECT_SCHEMA_VERSION, [], |row| row.get::<_, String>(0)) {
        Ok(value) => value.parse::<i32>().map_err(|_| {
            Error::validation("schema_version", format!("stored version '{value}' is not a number"))
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Checks schema compatibility and initializes if needed.
///
/// A fresh database is initialized; any version other than
/// [`CURRENT_SCHEMA_VERSION`] is rejected.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSchemaVersion`] for a foreign version, or a
/// database error if initialization fails.
pub fn check_schema_compatibility(conn: &Connection) -> Result<()> {
    match get_schema_version(conn)? {
        0 => initialize_schema(conn),
        CURRENT_SCHEMA_VERSION => Ok(()),
        found => Err(Error::UnsupportedSchemaVersion {
            expected: CURRENT_SCHEMA_VERSION,
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connection() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_initialize_schema() {
        let conn = create_test_connection();
        initialize_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        for table in ["devices", "requesters", "reservations", "queue_entries"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "{table} should start empty");
        }
    }

    #[test]
    fn test_get_schema_version_uninitialized() {
        let conn = create_test_connection();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_check_schema_compatibility_is_repeatable() {
        let conn = create_test_connection();
        check_schema_compatibility(&conn).unwrap();
        check_schema_compatibility(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_check_schema_compatibility_newer_version() {
        let conn = create_test_connection();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = '999' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();

        let err = check_schema_compatibility(&conn).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedSchemaVersion {
                expected: CURRENT_SCHEMA_VERSION,
                found: 999
            }
        ));
    }

    #[test]
    fn test_active_reservation_indexes_are_partial() {
        let conn = create_test_connection();
        initialize_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO devices (brand, model, capacity_gb, ram_gb, tier) VALUES ('a', 'b', 1, 1, 'low');
             INSERT INTO requesters (name, tier_needed) VALUES ('r1', 'low');
             INSERT INTO requesters (name, tier_needed) VALUES ('r2', 'low');
             INSERT INTO reservations (requester_id, device_id, status, created_at, updated_at)
                 VALUES (1, 1, 'completed', 0, 0);
             INSERT INTO reservations (requester_id, device_id, status, created_at, updated_at)
                 VALUES (1, 1, 'active', 0, 0);",
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO reservations (requester_id, device_id, status, created_at, updated_at)
             VALUES (2, 1, 'active', 0, 0)",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_queue_requester_is_unique() {
        let conn = create_test_connection();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO requesters (name, tier_needed) VALUES ('r', 'high')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO queue_entries (requester_id, tier, enqueued_at) VALUES (1, 'high', 0)",
            [],
        )
        .unwrap();

        let again = conn.execute(
            "INSERT INTO queue_entries (requester_id, tier, enqueued_at) VALUES (1, 'low', 1)",
            [],
        );
        assert!(again.is_err());
    }
}
