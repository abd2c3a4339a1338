//! Requester commands: register a requester and list them.

use crate::error::CliError;
use crate::output::{print_records, RequesterRecord};
use crate::utils::{GlobalOptions, Session};
use clap::{Args, Subcommand};
use loaner::config::OutputFormat;
use loaner::{NewRequester, Tier};

/// Manage requesters.
#[derive(Args)]
pub struct RequesterCommand {
    #[command(subcommand)]
    pub action: RequesterAction,
}

/// Requester subcommands.
#[derive(Subcommand)]
pub enum RequesterAction {
    /// Register a requester
    Add(RequesterAddArgs),

    /// List requesters
    List(RequesterListArgs),
}

/// Arguments for `requester add`.
#[derive(Args)]
pub struct RequesterAddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Tier of device the requester needs
    #[arg(long, value_name = "TIER")]
    pub tier: Tier,
}

/// Arguments for `requester list`.
#[derive(Args)]
pub struct RequesterListArgs {
    /// Only requesters currently holding a device
    #[arg(long)]
    pub holding: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,
}

impl RequesterCommand {
    /// Execute the requester command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;
        match self.action {
            RequesterAction::Add(args) => {
                let requester = session
                    .manager
                    .register_requester(NewRequester::new(args.name, args.tier))?;
                println!("{}", requester.id());
                if !global.quiet {
                    eprintln!(
                        "Registered {} (needs {} tier)",
                        requester.name(),
                        requester.tier_needed()
                    );
                }
                Ok(())
            }
            RequesterAction::List(args) => {
                let records: Vec<RequesterRecord> = session
                    .manager
                    .requesters()
                    .iter()
                    .filter(|r| !args.holding || r.holds_device())
                    .map(RequesterRecord::from)
                    .collect();
                print_records(
                    args.format.unwrap_or_else(|| session.config.output_format()),
                    &records,
                )
            }
        }
    }
}
