//! Reserve command implementation.
//!
//! Loans a specific free device to a requester.

use crate::error::CliError;
use crate::utils::{GlobalOptions, Session};
use clap::Args;
use loaner::{DeviceId, RequesterId};

/// Loan a device to a requester.
#[derive(Args)]
pub struct ReserveCommand {
    /// Device to loan
    #[arg(long, value_name = "ID")]
    pub device: i64,

    /// Requester receiving the device
    #[arg(long, value_name = "ID")]
    pub requester: i64,
}

impl ReserveCommand {
    /// Execute the reserve command.
    ///
    /// Prints the new reservation id on stdout.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;
        let reservation = session
            .manager
            .create_reservation(DeviceId(self.device), RequesterId(self.requester))?;

        println!("{}", reservation.id());
        if global.verbose {
            eprintln!(
                "Loaned device {} to requester {}",
                reservation.device_id(),
                reservation.requester_id()
            );
        }
        Ok(())
    }
}
