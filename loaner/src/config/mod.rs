//! Configuration system for loaner.
//!
//! This module provides layered configuration with support for:
//! - a YAML user configuration file (`<data_dir>/config.yaml`)
//! - `LOANER_*` environment variable overrides
//! - programmatic configuration via the builder
//!
//! # Configuration Precedence
//!
//! Highest to lowest:
//!
//! 1. Programmatic overrides (via `ConfigBuilder::with_config`)
//! 2. Environment variables (`LOANER_*`)
//! 3. User config (`~/.loaner/config.yaml` or `--data-dir`)
//! 4. Built-in defaults
//!
//! # Examples
//!
//! ```no_run
//! use loaner::config::ConfigBuilder;
//! use std::path::Path;
//!
//! let config = ConfigBuilder::new()
//!     .with_data_dir(Path::new("/var/lib/loaner"))
//!     .build()
//!     .unwrap();
//!
//! println!("{} workers", config.worker_threads());
//! ```

pub mod builder;
pub mod environment;
pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

#[cfg(all(test, feature = "property-tests"))]
mod proptests;

pub use builder::ConfigBuilder;
pub use environment::EnvironmentConfig;
pub use loader::{ConfigLoader, ConfigSource, CONFIG_FILE_NAME};
pub use merger::ConfigMerger;
pub use schema::{
    Config, DatabaseSettings, OutputFormat, PoolSettings, TierSettings, WorkerSettings,
};
pub use validator::ConfigValidator;
