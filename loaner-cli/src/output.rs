//! Tabular output in table, JSON and CSV form.
//!
//! Each listing command converts its items into a [`Record`] and hands the
//! slice to [`print_records`], which renders the configured format.

use crate::error::CliError;
use crate::utils::{format_age, format_timestamp};
use loaner::config::OutputFormat;
use loaner::{Device, QueueEntry, Requester, Reservation, Tier};
use serde::Serialize;
use std::io::Write;

/// A row of a listing.
pub trait Record: Serialize {
    /// Column headers, in field order.
    const HEADERS: &'static [&'static str];

    /// Field values rendered as text, in header order.
    fn fields(&self) -> Vec<String>;
}

/// Write `records` to stdout in `format`.
pub fn print_records<R: Record>(format: OutputFormat, records: &[R]) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_records(&mut handle, format, records)
}

/// Write `records` to `out` in `format`.
pub fn write_records<R: Record, W: Write>(
    out: &mut W,
    format: OutputFormat,
    records: &[R],
) -> Result<(), CliError> {
    match format {
        OutputFormat::Table => {
            let header_line = R::HEADERS
                .iter()
                .map(|s| s.to_uppercase())
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(out, "{header_line}")?;
            for record in records {
                writeln!(out, "{}", record.fields().join("\t"))?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(R::HEADERS)?;
            for record in records {
                writer.write_record(record.fields())?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Listing row for a device.
#[derive(Debug, Serialize)]
pub struct DeviceRecord {
    id: i64,
    brand: String,
    model: String,
    capacity_gb: u32,
    ram_gb: u32,
    tier: Tier,
    state: String,
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id().0,
            brand: device.brand().to_string(),
            model: device.model().to_string(),
            capacity_gb: device.capacity_gb(),
            ram_gb: device.ram_gb(),
            tier: device.tier(),
            state: device.state().to_string(),
        }
    }
}

impl Record for DeviceRecord {
    const HEADERS: &'static [&'static str] =
        &["id", "brand", "model", "capacity_gb", "ram_gb", "tier", "state"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.brand.clone(),
            self.model.clone(),
            self.capacity_gb.to_string(),
            self.ram_gb.to_string(),
            self.tier.to_string(),
            self.state.clone(),
        ]
    }
}

/// Listing row for a requester.
#[derive(Debug, Serialize)]
pub struct RequesterRecord {
    id: i64,
    name: String,
    tier_needed: Tier,
    holds_device: bool,
}

impl From<&Requester> for RequesterRecord {
    fn from(requester: &Requester) -> Self {
        Self {
            id: requester.id().0,
            name: requester.name().to_string(),
            tier_needed: requester.tier_needed(),
            holds_device: requester.holds_device(),
        }
    }
}

impl Record for RequesterRecord {
    const HEADERS: &'static [&'static str] = &["id", "name", "tier_needed", "holds_device"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.tier_needed.to_string(),
            if self.holds_device { "yes" } else { "no" }.to_string(),
        ]
    }
}

/// Listing row for a reservation.
#[derive(Debug, Serialize)]
pub struct ReservationRecord {
    id: i64,
    device_id: i64,
    requester_id: i64,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<&Reservation> for ReservationRecord {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id().0,
            device_id: reservation.device_id().0,
            requester_id: reservation.requester_id().0,
            status: reservation.status().to_string(),
            created_at: format_timestamp(reservation.created_at()),
            updated_at: format_timestamp(reservation.updated_at()),
        }
    }
}

impl Record for ReservationRecord {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "device_id",
        "requester_id",
        "status",
        "created_at",
        "updated_at",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.device_id.to_string(),
            self.requester_id.to_string(),
            self.status.clone(),
            self.created_at.clone(),
            self.updated_at.clone(),
        ]
    }
}

/// Listing row for a waiting requester.
#[derive(Debug, Serialize)]
pub struct QueueRecord {
    tier: Tier,
    position: usize,
    requester_id: i64,
    enqueued_at: String,
    waiting: String,
}

impl QueueRecord {
    /// Row for `entry` at 0-based `position` of its queue.
    pub fn new(position: usize, entry: &QueueEntry) -> Self {
        Self {
            tier: entry.tier,
            position,
            requester_id: entry.requester_id.0,
            enqueued_at: format_timestamp(entry.enqueued_at),
            waiting: format_age(entry.enqueued_at),
        }
    }
}

impl Record for QueueRecord {
    const HEADERS: &'static [&'static str] =
        &["tier", "position", "requester_id", "enqueued_at", "waiting"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.tier.to_string(),
            self.position.to_string(),
            self.requester_id.to_string(),
            self.enqueued_at.clone(),
            self.waiting.clone(),
        ]
    }
}
