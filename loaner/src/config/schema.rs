//! Configuration schema definitions.
//!
//! Every field is optional so that partial files and environment overrides
//! can be layered; the `*_or_default` accessors resolve the final values.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::database::PoolConfig;
use crate::error::{Error, Result};

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
/// Default number of worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 4;
/// Default capacity of the worker job queue.
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 64;
/// Default minimum RAM for a device to classify as high tier.
pub const DEFAULT_HIGH_MIN_RAM_GB: u32 = 16;

/// Complete configuration structure.
///
/// # Examples
///
/// ```
/// use loaner::config::{Config, WorkerSettings};
///
/// let config = Config {
///     workers: Some(WorkerSettings {
///         threads: Some(2),
///         queue_capacity: None,
///     }),
///     ..Default::default()
/// };
/// assert_eq!(config.worker_threads(), 2);
/// assert_eq!(config.worker_queue_capacity(), 64);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Store settings.
    pub database: Option<DatabaseSettings>,

    /// Connection pool settings.
    pub pool: Option<PoolSettings>,

    /// Worker pool settings.
    pub workers: Option<WorkerSettings>,

    /// Tier classification settings.
    pub tiers: Option<TierSettings>,

    /// Output format for list commands.
    pub output_format: Option<OutputFormat>,
}

/// Store settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    /// How long SQLite waits on a locked database (milliseconds).
    pub busy_timeout_ms: Option<u64>,
}

/// Connection pool settings.
///
/// # Examples
///
/// ```
/// use loaner::config::PoolSettings;
///
/// let yaml = "max_connections: 8\ninitial_backoff_ms: 10\n";
/// let pool: PoolSettings = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(pool.max_connections, Some(8));
/// assert_eq!(pool.max_backoff_ms, None);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: Option<usize>,
    /// Acquisition attempts before giving up.
    pub acquire_attempts: Option<u32>,
    /// First retry delay (milliseconds).
    pub initial_backoff_ms: Option<u64>,
    /// Cap on the retry delay (milliseconds).
    pub max_backoff_ms: Option<u64>,
}

/// Worker pool settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkerSettings {
    /// Number of worker threads.
    pub threads: Option<usize>,
    /// Jobs that may wait before submission fails.
    pub queue_capacity: Option<usize>,
}

/// Tier classification settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TierSettings {
    /// Devices with at least this much RAM are high tier.
    pub high_min_ram_gb: Option<u32>,
}

/// Output format for list commands.
///
/// # Examples
///
/// ```
/// use loaner::config::OutputFormat;
///
/// let format: OutputFormat = "JSON".parse().unwrap();
/// assert_eq!(format, OutputFormat::Json);
/// assert_eq!(format.to_string(), "json");
/// ```
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output format.
    Json,
    /// CSV output format.
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(Error::validation(
                "output_format",
                format!("unknown format '{other}' (expected table, json or csv)"),
            )),
        }
    }
}

impl Config {
    /// Returns a configuration with every field set to its built-in default.
    #[must_use]
    pub fn with_defaults() -> Self {
        let pool = PoolConfig::default();
        Self {
            database: Some(DatabaseSettings {
                busy_timeout_ms: Some(DEFAULT_BUSY_TIMEOUT_MS),
            }),
            pool: Some(PoolSettings {
                max_connections: Some(pool.max_connections),
                acquire_attempts: Some(pool.acquire_attempts),
                initial_backoff_ms: Some(millis(pool.initial_backoff)),
                max_backoff_ms: Some(millis(pool.max_backoff)),
            }),
            workers: Some(WorkerSettings {
                threads: Some(DEFAULT_WORKER_THREADS),
                queue_capacity: Some(DEFAULT_WORKER_QUEUE_CAPACITY),
            }),
            tiers: Some(TierSettings {
                high_min_ram_gb: Some(DEFAULT_HIGH_MIN_RAM_GB),
            }),
            output_format: Some(OutputFormat::Table),
        }
    }

    /// Resolved SQLite busy timeout.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(
            self.database
                .as_ref()
                .and_then(|d| d.busy_timeout_ms)
                .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        )
    }

    /// Resolved connection pool policy.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        let defaults = PoolConfig::default();
        let Some(pool) = self.pool.as_ref() else {
            return defaults;
        };
        PoolConfig {
            max_connections: pool.max_connections.unwrap_or(defaults.max_connections),
            acquire_attempts: pool.acquire_attempts.unwrap_or(defaults.acquire_attempts),
            initial_backoff: pool
                .initial_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: pool
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
        }
    }

    /// Resolved number of worker threads.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.workers
            .as_ref()
            .and_then(|w| w.threads)
            .unwrap_or(DEFAULT_WORKER_THREADS)
    }

    /// Resolved worker queue capacity.
    #[must_use]
    pub fn worker_queue_capacity(&self) -> usize {
        self.workers
            .as_ref()
            .and_then(|w| w.queue_capacity)
            .unwrap_or(DEFAULT_WORKER_QUEUE_CAPACITY)
    }

    /// Resolved high tier RAM threshold.
    #[must_use]
    pub fn high_min_ram_gb(&self) -> u32 {
        self.tiers
            .as_ref()
            .and_then(|t| t.high_min_ram_gb)
            .unwrap_or(DEFAULT_HIGH_MIN_RAM_GB)
    }

    /// Resolved output format.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or_default()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
