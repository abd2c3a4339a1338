//! Build script for loaner-cli.
//!
//! Generates the `loaner.1` man page into OUT_DIR with clap_mangen.
//!
//! Build scripts cannot depend on the crate being built, so the command
//! structure is restated here.

use clap::{Arg, Command};
use clap_mangen::Man;
use std::fs;
use std::path::PathBuf;

/// Build the CLI command structure for man page generation.
///
/// Keep this synchronized with src/cli.rs.
fn build_cli() -> Command {
    Command::new("loaner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loan devices and manage per-tier waitlists")
        .long_about(
            "Command-line tool for loaning a fixed pool of devices to requesters, \
             with a FIFO waitlist per performance tier",
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .help("Suppress non-essential output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .help("Override the data directory location")
                .value_name("PATH")
                .global(true)
                .env("LOANER_DATA_DIR"),
        )
        .arg(
            Arg::new("busy-timeout")
                .long("busy-timeout")
                .help("Override the database busy timeout (in milliseconds)")
                .value_name("MILLIS")
                .global(true),
        )
        .subcommands(vec![
            Command::new("init")
                .about("Initialize the data directory and database")
                .long_about("Create the data directory, the database and optionally config.yaml"),
            Command::new("device")
                .about("Provision and list devices")
                .long_about("Register devices (tier derived from RAM unless given) and list them"),
            Command::new("requester")
                .about("Register and list requesters")
                .long_about("Register requesters with the tier they need and list them"),
            Command::new("reserve")
                .about("Loan a free device to a requester")
                .long_about("Create an active reservation binding a device to a requester"),
            Command::new("complete")
                .about("Mark a reservation completed")
                .long_about("Return the device; it passes to the next waiting requester"),
            Command::new("cancel")
                .about("Cancel a reservation")
                .long_about("Withdraw the reservation; the device passes to the next waiter"),
            Command::new("queue")
                .about("Manage the per-tier waitlists")
                .long_about("Join, leave, list or clear the HIGH and LOW waitlists"),
            Command::new("list")
                .about("List reservations")
                .long_about("Display active reservations, or the full history with --all"),
            Command::new("check")
                .about("Check stored data for inconsistencies")
                .long_about("Audit devices, requesters, reservations and queues; exit 1 on problems"),
            Command::new("demo")
                .about("Run sample traffic through the worker pool")
                .long_about("Seed sample data and drive loans, queueing and returns concurrently"),
            Command::new("completions")
                .about("Generate shell completion scripts")
                .long_about("Generate shell completion scripts for bash, zsh, fish, or PowerShell"),
        ])
}

fn main() -> std::io::Result<()> {
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR is not set")
    })?);
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(man_dir.join("loaner.1"), buffer)?;

    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=src/commands/");
    Ok(())
}
