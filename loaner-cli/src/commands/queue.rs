//! Queue commands: join, leave, inspect and clear the tier waitlists.

use crate::error::CliError;
use crate::output::{print_records, QueueRecord};
use crate::utils::{GlobalOptions, Session};
use clap::{Args, Subcommand};
use loaner::config::OutputFormat;
use loaner::{QueueOutcome, RequesterId, Tier};

/// Manage the per-tier waitlists.
#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub action: QueueAction,
}

/// Queue subcommands.
#[derive(Subcommand)]
pub enum QueueAction {
    /// Put a requester on the waitlist (or loan a free device right away)
    Add(QueueAddArgs),

    /// Take a requester off a waitlist
    Remove(QueueRemoveArgs),

    /// Show who is waiting
    List(QueueListArgs),

    /// Empty a waitlist
    Clear(QueueClearArgs),
}

/// Arguments for `queue add`.
#[derive(Args)]
pub struct QueueAddArgs {
    /// Requester to queue
    #[arg(long, value_name = "ID")]
    pub requester: i64,

    /// Tier to wait for (default: the tier the requester needs)
    #[arg(long, value_name = "TIER")]
    pub tier: Option<Tier>,
}

/// Arguments for `queue remove`.
#[derive(Args)]
pub struct QueueRemoveArgs {
    /// Requester to remove
    #[arg(long, value_name = "ID")]
    pub requester: i64,

    /// Waitlist to remove from
    #[arg(long, value_name = "TIER")]
    pub tier: Tier,
}

/// Arguments for `queue list`.
#[derive(Args)]
pub struct QueueListArgs {
    /// Only this waitlist
    #[arg(long, value_name = "TIER")]
    pub tier: Option<Tier>,

    /// Output format (table, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,
}

/// Arguments for `queue clear`.
#[derive(Args)]
pub struct QueueClearArgs {
    /// Waitlist to clear
    #[arg(long, value_name = "TIER")]
    pub tier: Tier,
}

impl QueueCommand {
    /// Execute the queue command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;
        match self.action {
            QueueAction::Add(args) => add(&session, args),
            QueueAction::Remove(args) => {
                let removed = session
                    .manager
                    .remove_from_queue(RequesterId(args.requester), args.tier)?;
                if !global.quiet {
                    if removed {
                        println!(
                            "Removed requester {} from the {} queue",
                            args.requester, args.tier
                        );
                    } else {
                        println!(
                            "Requester {} was not waiting in the {} queue",
                            args.requester, args.tier
                        );
                    }
                }
                Ok(())
            }
            QueueAction::List(args) => {
                let tiers = args.tier.map_or(Tier::ALL.to_vec(), |tier| vec![tier]);
                let records: Vec<QueueRecord> = tiers
                    .into_iter()
                    .flat_map(|tier| {
                        session
                            .manager
                            .queue_snapshot(tier)
                            .iter()
                            .enumerate()
                            .map(|(position, entry)| QueueRecord::new(position, entry))
                            .collect::<Vec<_>>()
                    })
                    .collect();
                print_records(
                    args.format.unwrap_or_else(|| session.config.output_format()),
                    &records,
                )
            }
            QueueAction::Clear(args) => {
                let cleared = session.manager.clear_queue(args.tier)?;
                if !global.quiet {
                    println!("Cleared {cleared} requester(s) from the {} queue", args.tier);
                }
                Ok(())
            }
        }
    }
}

/// Prints one line describing the outcome: `reserved <id>`, `queued <tier> <position>`,
/// `holding` or `already-queued <tier>`.
fn add(session: &Session, args: QueueAddArgs) -> Result<(), CliError> {
    let requester_id = RequesterId(args.requester);
    // An unknown requester is rejected by the engine whatever the tier
    let tier = args
        .tier
        .or_else(|| session.manager.requester(requester_id).map(|r| r.tier_needed()))
        .unwrap_or(Tier::Low);

    match session.manager.add_to_queue(requester_id, tier)? {
        QueueOutcome::Reserved(reservation) => println!("reserved {}", reservation.id()),
        QueueOutcome::Enqueued { tier, position } => println!("queued {tier} {position}"),
        QueueOutcome::AlreadyHoldsDevice => println!("holding"),
        QueueOutcome::AlreadyQueued { tier } => println!("already-queued {tier}"),
    }
    Ok(())
}
