//! Check command implementation.
//!
//! Runs the consistency audit and fails with exit code 1 when anything is
//! out of place.

use crate::error::CliError;
use crate::utils::{GlobalOptions, Session};
use clap::Args;

/// Verify the cross-entity invariants of the stored data.
#[derive(Args)]
pub struct CheckCommand {
    /// Print violations as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    /// Execute the check command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;
        let violations = session.manager.verify_consistency()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&violations)?);
        } else {
            for violation in &violations {
                println!("{violation}");
            }
        }

        if violations.is_empty() {
            if !global.quiet && !self.json {
                println!("OK: no inconsistencies found");
            }
            Ok(())
        } else {
            Err(CliError::SemanticFailure(format!(
                "{} inconsistenc{} found",
                violations.len(),
                if violations.len() == 1 { "y" } else { "ies" }
            )))
        }
    }
}
