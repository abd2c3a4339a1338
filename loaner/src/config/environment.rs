//! Environment variable handling for configuration overrides.

use std::env;
use std::str::FromStr;

use crate::config::schema::{Config, OutputFormat};
use crate::error::{Error, Result};

/// Overrides `database.busy_timeout_ms`.
pub const BUSY_TIMEOUT_ENV: &str = "LOANER_BUSY_TIMEOUT_MS";
/// Overrides `pool.max_connections`.
pub const MAX_CONNECTIONS_ENV: &str = "LOANER_MAX_CONNECTIONS";
/// Overrides `pool.acquire_attempts`.
pub const ACQUIRE_ATTEMPTS_ENV: &str = "LOANER_ACQUIRE_ATTEMPTS";
/// Overrides `workers.threads`.
pub const WORKER_THREADS_ENV: &str = "LOANER_WORKER_THREADS";
/// Overrides `workers.queue_capacity`.
pub const WORKER_QUEUE_CAPACITY_ENV: &str = "LOANER_WORKER_QUEUE_CAPACITY";
/// Overrides `tiers.high_min_ram_gb`.
pub const HIGH_MIN_RAM_ENV: &str = "LOANER_HIGH_MIN_RAM_GB";
/// Overrides `output_format`.
pub const OUTPUT_FORMAT_ENV: &str = "LOANER_OUTPUT_FORMAT";

/// Handles environment variable overrides for configuration.
///
/// # Examples
///
/// ```no_run
/// use loaner::config::{Config, EnvironmentConfig};
///
/// let mut config = Config::default();
/// EnvironmentConfig::apply_overrides(&mut config).unwrap();
/// ```
#[derive(Debug)]
pub struct EnvironmentConfig;

impl EnvironmentConfig {
    /// Applies every `LOANER_*` override that is set.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the variable if a value does not
    /// parse.
    pub fn apply_overrides(config: &mut Config) -> Result<()> {
        if let Some(ms) = Self::read::<u64>(BUSY_TIMEOUT_ENV)? {
            config
                .database
                .get_or_insert_with(Default::default)
                .busy_timeout_ms = Some(ms);
        }

        if let Some(max) = Self::read::<usize>(MAX_CONNECTIONS_ENV)? {
            config.pool.get_or_insert_with(Default::default).max_connections = Some(max);
        }
        if let Some(attempts) = Self::read::<u32>(ACQUIRE_ATTEMPTS_ENV)? {
            config.pool.get_or_insert_with(Default::default).acquire_attempts = Some(attempts);
        }

        if let Some(threads) = Self::read::<usize>(WORKER_THREADS_ENV)? {
            config.workers.get_or_insert_with(Default::default).threads = Some(threads);
        }
        if let Some(capacity) = Self::read::<usize>(WORKER_QUEUE_CAPACITY_ENV)? {
            config
                .workers
                .get_or_insert_with(Default::default)
                .queue_capacity = Some(capacity);
        }

        if let Some(ram) = Self::read::<u32>(HIGH_MIN_RAM_ENV)? {
            config.tiers.get_or_insert_with(Default::default).high_min_ram_gb = Some(ram);
        }

        if let Ok(format) = env::var(OUTPUT_FORMAT_ENV) {
            config.output_format = Some(format.parse::<OutputFormat>().map_err(|_| {
                Error::validation(
                    OUTPUT_FORMAT_ENV,
                    format!("invalid output format '{format}' (expected table, json or csv)"),
                )
            })?);
        }

        Ok(())
    }

    fn read<T: FromStr>(name: &str) -> Result<Option<T>> {
        match env::var(name) {
            Ok(value) => Self::parse_number(name, &value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| {
                Error::validation(
                    name,
                    format!("must be a non-negative integer, got '{value}'"),
                )
            })
    }
}
