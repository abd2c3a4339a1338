//! List command implementation.
//!
//! Displays active reservations, or the full history with `--all`, in
//! table, JSON or CSV form.

use crate::error::CliError;
use crate::output::{print_records, ReservationRecord};
use crate::utils::{GlobalOptions, Session};
use clap::Args;
use loaner::config::OutputFormat;
use loaner::{ReservationStatus, Tier};

/// List reservations.
#[derive(Args)]
pub struct ListCommand {
    /// Include completed and cancelled reservations
    #[arg(long)]
    pub all: bool,

    /// Only reservations with this status
    #[arg(long, value_name = "STATUS")]
    pub status: Option<ReservationStatus>,

    /// Only reservations of devices in this tier
    #[arg(long, value_name = "TIER")]
    pub tier: Option<Tier>,

    /// Output format (table, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,
}

impl ListCommand {
    /// Execute the list command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;

        let mut reservations = if self.all || self.status.is_some() {
            session.manager.reservation_history()?
        } else {
            session.manager.active_reservations()
        };

        if let Some(status) = self.status {
            reservations.retain(|r| r.status() == status);
        }
        if let Some(tier) = self.tier {
            reservations.retain(|r| {
                session
                    .manager
                    .device(r.device_id())
                    .is_some_and(|d| d.tier() == tier)
            });
        }

        let records: Vec<ReservationRecord> =
            reservations.iter().map(ReservationRecord::from).collect();
        print_records(
            self.format.unwrap_or_else(|| session.config.output_format()),
            &records,
        )
    }
}
