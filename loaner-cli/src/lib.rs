//! Library exports for loaner-cli.
//!
//! Exposes the CLI structure for documentation tooling and the command
//! implementations for tests.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod utils;

pub use cli::Cli;
