//! `complete` and `cancel`: end an active reservation.
//!
//! Ending a loan frees the device, which is handed straight to the head of
//! its tier queue when anyone is waiting.

use crate::error::CliError;
use crate::utils::{GlobalOptions, Session};
use clap::Args;
use loaner::{ReservationId, ReservationStatus};

/// End a reservation with the given status.
#[derive(Args)]
pub struct FinishCommand {
    /// Reservation to end
    #[arg(value_name = "RESERVATION")]
    pub reservation: i64,
}

impl FinishCommand {
    /// Execute with `status` as the terminal status.
    pub fn execute(
        self,
        global: &GlobalOptions,
        status: ReservationStatus,
    ) -> Result<(), CliError> {
        let session = Session::open(global)?;
        let id = ReservationId(self.reservation);
        let before = session
            .manager
            .reservation(id)?
            .map(|r| r.device_id());

        let changed = session.manager.update_reservation_status(id, status)?;

        if global.quiet {
            return Ok(());
        }
        if !changed {
            println!("Reservation {id} is already {status}");
            return Ok(());
        }
        println!("Reservation {id} {status}");

        // Report the hand-over to the next waiter, if any
        if let Some(device_id) = before {
            if let Some(next) = session
                .manager
                .active_reservations()
                .into_iter()
                .find(|r| r.device_id() == device_id)
            {
                println!(
                    "Device {device_id} assigned to requester {} (reservation {})",
                    next.requester_id(),
                    next.id()
                );
            }
        }
        Ok(())
    }
}
