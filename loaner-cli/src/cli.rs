//! CLI structure and command definitions.
//!
//! This module defines the main CLI structure using clap's derive macros,
//! including global options and subcommands.

use crate::commands::{
    CheckCommand, CompletionsCommand, DemoCommand, DeviceCommand, FinishCommand, InitCommand,
    ListCommand, QueueCommand, RequesterCommand, ReserveCommand,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line tool for loaning devices and managing per-tier waitlists.
#[derive(Parser)]
#[command(name = "loaner")]
#[command(version, about = "Loan devices and manage per-tier waitlists", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the data directory location
    #[arg(long, value_name = "PATH", global = true, env = "LOANER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Override the database busy timeout (in milliseconds)
    #[arg(long, value_name = "MILLIS", global = true)]
    pub busy_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Command {
    /// Initialize the data directory and database
    Init(InitCommand),

    /// Provision and list devices
    Device(DeviceCommand),

    /// Register and list requesters
    Requester(RequesterCommand),

    /// Loan a free device to a requester
    Reserve(ReserveCommand),

    /// Mark a reservation completed (device returned)
    Complete(FinishCommand),

    /// Cancel a reservation
    Cancel(FinishCommand),

    /// Manage the per-tier waitlists
    Queue(QueueCommand),

    /// List reservations
    List(ListCommand),

    /// Check stored data for inconsistencies
    Check(CheckCommand),

    /// Run sample traffic through the worker pool
    Demo(DemoCommand),

    /// Generate shell completion scripts
    Completions(CompletionsCommand),
}
