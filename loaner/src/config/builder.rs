//! Layered configuration assembly.

use std::path::{Path, PathBuf};

use crate::config::environment::EnvironmentConfig;
use crate::config::loader::ConfigLoader;
use crate::config::merger::ConfigMerger;
use crate::config::schema::Config;
use crate::config::validator::ConfigValidator;
use crate::error::Result;

/// Builds a [`Config`] from defaults, files, environment and overrides.
///
/// # Examples
///
/// ```
/// use loaner::config::{Config, ConfigBuilder, WorkerSettings};
///
/// let config = ConfigBuilder::new()
///     .skip_files()
///     .skip_env()
///     .with_config(Config {
///         workers: Some(WorkerSettings { threads: Some(1), queue_capacity: None }),
///         ..Default::default()
///     })
///     .build()
///     .unwrap();
/// assert_eq!(config.worker_threads(), 1);
/// assert_eq!(config.worker_queue_capacity(), 64);
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    data_dir: Option<PathBuf>,
    skip_files: bool,
    skip_env: bool,
    overrides: Vec<Config>,
}

impl ConfigBuilder {
    /// Creates a builder that reads every source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the user config from `data_dir` instead of the default location.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: &Path) -> Self {
        self.data_dir = Some(data_dir.to_path_buf());
        self
    }

    /// Ignores configuration files.
    #[must_use]
    pub const fn skip_files(mut self) -> Self {
        self.skip_files = true;
        self
    }

    /// Ignores `LOANER_*` environment variables.
    #[must_use]
    pub const fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Layers `config` above every other source. Later calls win.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.overrides.push(config);
        self
    }

    /// Merges all sources over the defaults and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, an environment
    /// value is malformed, or the merged configuration is invalid.
    pub fn build(self) -> Result<Config> {
        let mut config = Config::with_defaults();

        if !self.skip_files {
            for source in ConfigLoader::load_all(self.data_dir.as_deref())? {
                ConfigValidator::validate(&source.config)?;
                ConfigMerger::merge_into(&mut config, &source.config);
            }
        }

        if !self.skip_env {
            let mut from_env = Config::default();
            EnvironmentConfig::apply_overrides(&mut from_env)?;
            ConfigMerger::merge_into(&mut config, &from_env);
        }

        for overrides in &self.overrides {
            ConfigMerger::merge_into(&mut config, overrides);
        }

        ConfigValidator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::environment::{MAX_CONNECTIONS_ENV, OUTPUT_FORMAT_ENV};
    use crate::config::loader::CONFIG_FILE_NAME;
    use crate::config::schema::{OutputFormat, PoolSettings};
    use serial_test::serial;
    use std::{env, fs};
    use tempfile::TempDir;

    #[test]
    fn test_defaults_only() {
        let config = ConfigBuilder::new().skip_files().skip_env().build().unwrap();
        assert_eq!(config, Config::with_defaults());
    }

    #[test]
    #[serial]
    fn test_precedence_file_env_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "pool:\n  max_connections: 2\n  acquire_attempts: 9\noutput_format: csv\n",
        )
        .unwrap();
        env::set_var(MAX_CONNECTIONS_ENV, "3");
        env::remove_var(OUTPUT_FORMAT_ENV);

        let result = ConfigBuilder::new()
            .with_data_dir(dir.path())
            .with_config(Config {
                output_format: Some(OutputFormat::Json),
                ..Default::default()
            })
            .build();
        env::remove_var(MAX_CONNECTIONS_ENV);
        let config = result.unwrap();

        let pool = config.pool_config();
        assert_eq!(pool.max_connections, 3);
        assert_eq!(pool.acquire_attempts, 9);
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.worker_threads(), 4);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "workers:\n  threads: 0\n").unwrap();
        let err = ConfigBuilder::new()
            .with_data_dir(dir.path())
            .skip_env()
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = ConfigBuilder::new()
            .skip_files()
            .skip_env()
            .with_config(Config {
                pool: Some(PoolSettings {
                    initial_backoff_ms: Some(5000),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }
}
