//! Utility functions for CLI operations.
//!
//! Data directory resolution, layered configuration, and opening the
//! engine over the database in that directory.

use crate::error::CliError;
use loaner::config::{Config, DatabaseSettings};
use loaner::database::{database_path, resolve_data_dir as lib_resolve_data_dir};
use loaner::{ConfigBuilder, DatabaseConfig, EventBus, ReservationManager, Store};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Global CLI options shared across all commands.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Enable verbose output.
    pub verbose: bool,

    /// Suppress non-essential output.
    pub quiet: bool,

    /// Override the data directory location.
    pub data_dir: Option<PathBuf>,

    /// Override the busy timeout (in milliseconds).
    pub busy_timeout: Option<u64>,
}

/// Resolve the data directory: `--data-dir`, then `LOANER_DATA_DIR`, then `~/.loaner`.
pub fn resolve_data_dir(global: &GlobalOptions) -> Result<PathBuf, CliError> {
    lib_resolve_data_dir(global.data_dir.as_deref()).map_err(|e| CliError::Config(e.to_string()))
}

/// Load hierarchical configuration.
///
/// Configuration is merged from multiple sources with precedence:
/// 1. Global options (highest priority)
/// 2. Environment variables
/// 3. `<data_dir>/config.yaml`
/// 4. Built-in defaults (lowest priority)
pub fn load_configuration(global: &GlobalOptions, data_dir: &Path) -> Result<Config, CliError> {
    let mut builder = ConfigBuilder::new().with_data_dir(data_dir);

    if let Some(timeout_ms) = global.busy_timeout {
        if timeout_ms == 0 {
            return Err(CliError::InvalidArguments(
                "--busy-timeout must be greater than 0".to_string(),
            ));
        }
        builder = builder.with_config(Config {
            database: Some(DatabaseSettings {
                busy_timeout_ms: Some(timeout_ms),
            }),
            ..Config::default()
        });
    }

    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

/// An opened engine plus the settings it was opened with.
pub struct Session {
    /// Resolved data directory.
    pub data_dir: PathBuf,
    /// Effective configuration.
    pub config: Config,
    /// The loaded engine.
    pub manager: ReservationManager,
}

impl Session {
    /// Open the engine over an existing database.
    ///
    /// # Errors
    ///
    /// Returns `NoDataDirectory` if the database has not been initialized.
    pub fn open(global: &GlobalOptions) -> Result<Self, CliError> {
        Self::open_with(global, false)
    }

    /// Open the engine, creating the data directory and database if needed.
    pub fn open_or_create(global: &GlobalOptions) -> Result<Self, CliError> {
        Self::open_with(global, true)
    }

    fn open_with(global: &GlobalOptions, create: bool) -> Result<Self, CliError> {
        let data_dir = resolve_data_dir(global)?;
        let db_path = database_path(&data_dir);
        if !create && !db_path.exists() {
            return Err(CliError::NoDataDirectory(shorten_path(&data_dir)));
        }

        let config = load_configuration(global, &data_dir)?;

        let mut db_config = DatabaseConfig::new(db_path).with_busy_timeout(config.busy_timeout());
        if !create {
            db_config = db_config.existing_only();
        }

        let store = Store::open(db_config, config.pool_config())?;
        let manager = ReservationManager::load(store, EventBus::new())?;
        log::debug!("opened engine in {}", data_dir.display());

        Ok(Self {
            data_dir,
            config,
            manager,
        })
    }
}

/// Format a timestamp for display.
pub fn format_timestamp(ts: SystemTime) -> String {
    use chrono::{DateTime, Utc};
    let dt: DateTime<Utc> = ts.into();
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shorten a path for display.
///
/// Paths inside the home directory are shown as `~/...`.
pub fn shorten_path(path: &Path) -> String {
    if let Some(home) = home::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

/// Format a duration in seconds for display (e.g. `90s`).
pub fn format_age(since: SystemTime) -> String {
    let age = SystemTime::now()
        .duration_since(since)
        .unwrap_or(Duration::ZERO);
    format!("{}s", age.as_secs())
}
