//! Main entry point for the loaner CLI.
//!
//! Provisions devices and requesters, loans devices, manages the per-tier
//! waitlists and audits the stored data.

mod cli;
mod commands;
mod error;
mod output;
mod utils;

use clap::Parser;
use cli::{Cli, Command};
use loaner::ReservationStatus;
use utils::GlobalOptions;

fn main() {
    // Usage errors exit with 4; --help and --version print to stdout and exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(4);
        }
    };

    let _level = loaner::init_logger(cli.verbose, cli.quiet);

    let global = GlobalOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        data_dir: cli.data_dir,
        busy_timeout: cli.busy_timeout,
    };

    let result = match cli.command {
        Command::Init(cmd) => cmd.execute(&global),
        Command::Device(cmd) => cmd.execute(&global),
        Command::Requester(cmd) => cmd.execute(&global),
        Command::Reserve(cmd) => cmd.execute(&global),
        Command::Complete(cmd) => cmd.execute(&global, ReservationStatus::Completed),
        Command::Cancel(cmd) => cmd.execute(&global, ReservationStatus::Cancelled),
        Command::Queue(cmd) => cmd.execute(&global),
        Command::List(cmd) => cmd.execute(&global),
        Command::Check(cmd) => cmd.execute(&global),
        Command::Demo(cmd) => cmd.execute(&global),
        Command::Completions(cmd) => cmd.execute(&global),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
