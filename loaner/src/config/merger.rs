//! Configuration merging and precedence handling.

use crate::config::loader::ConfigSource;
use crate::config::schema::{Config, DatabaseSettings, PoolSettings, TierSettings, WorkerSettings};

/// Merges configuration sources according to precedence rules.
///
/// # Examples
///
/// ```
/// use loaner::config::{Config, ConfigMerger, OutputFormat};
///
/// let low = Config { output_format: Some(OutputFormat::Csv), ..Default::default() };
/// let high = Config { output_format: Some(OutputFormat::Json), ..Default::default() };
///
/// let mut result = low;
/// ConfigMerger::merge_into(&mut result, &high);
/// assert_eq!(result.output_format, Some(OutputFormat::Json));
/// ```
#[derive(Debug)]
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merges sources given lowest precedence first.
    #[must_use]
    pub fn merge(sources: Vec<ConfigSource>) -> Config {
        let mut result = Config::default();
        for source in sources {
            Self::merge_into(&mut result, &source.config);
        }
        result
    }

    /// Merges `source` into `target`; set fields of `source` win.
    ///
    /// Nested sections merge field by field.
    pub fn merge_into(target: &mut Config, source: &Config) {
        if source.output_format.is_some() {
            target.output_format = source.output_format;
        }

        if let Some(ref db) = source.database {
            let merged = Self::merge_database(target.database.as_ref(), db);
            target.database = Some(merged);
        }
        if let Some(ref pool) = source.pool {
            let merged = Self::merge_pool(target.pool.as_ref(), pool);
            target.pool = Some(merged);
        }
        if let Some(ref workers) = source.workers {
            let merged = Self::merge_workers(target.workers.as_ref(), workers);
            target.workers = Some(merged);
        }
        if let Some(ref tiers) = source.tiers {
            let merged = Self::merge_tiers(target.tiers.as_ref(), tiers);
            target.tiers = Some(merged);
        }
    }

    fn merge_database(
        target: Option<&DatabaseSettings>,
        source: &DatabaseSettings,
    ) -> DatabaseSettings {
        DatabaseSettings {
            busy_timeout_ms: source
                .busy_timeout_ms
                .or_else(|| target.and_then(|t| t.busy_timeout_ms)),
        }
    }

    fn merge_pool(target: Option<&PoolSettings>, source: &PoolSettings) -> PoolSettings {
        PoolSettings {
            max_connections: source
                .max_connections
                .or_else(|| target.and_then(|t| t.max_connections)),
            acquire_attempts: source
                .acquire_attempts
                .or_else(|| target.and_then(|t| t.acquire_attempts)),
            initial_backoff_ms: source
                .initial_backoff_ms
                .or_else(|| target.and_then(|t| t.initial_backoff_ms)),
            max_backoff_ms: source
                .max_backoff_ms
                .or_else(|| target.and_then(|t| t.max_backoff_ms)),
        }
    }

    fn merge_workers(target: Option<&WorkerSettings>, source: &WorkerSettings) -> WorkerSettings {
        WorkerSettings {
            threads: source.threads.or_else(|| target.and_then(|t| t.threads)),
            queue_capacity: source
                .queue_capacity
                .or_else(|| target.and_then(|t| t.queue_capacity)),
        }
    }

    fn merge_tiers(target: Option<&TierSettings>, source: &TierSettings) -> TierSettings {
        TierSettings {
            high_min_ram_gb: source
                .high_min_ram_gb
                .or_else(|| target.and_then(|t| t.high_min_ram_gb)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::path::PathBuf;

    #[test]
    fn test_merge_nested_field_by_field() {
        let mut target = Config {
            pool: Some(PoolSettings {
                max_connections: Some(2),
                acquire_attempts: Some(7),
                ..Default::default()
            }),
            ..Default::default()
        };
        let source = Config {
            pool: Some(PoolSettings {
                max_connections: Some(6),
                ..Default::default()
            }),
            ..Default::default()
        };

        ConfigMerger::merge_into(&mut target, &source);

        let pool = target.pool.unwrap();
        assert_eq!(pool.max_connections, Some(6));
        assert_eq!(pool.acquire_attempts, Some(7));
    }

    #[test]
    fn test_merge_keeps_target_when_source_unset() {
        let mut target = Config::with_defaults();
        ConfigMerger::merge_into(&mut target, &Config::default());
        assert_eq!(target, Config::with_defaults());
    }

    #[test]
    fn test_merge_sources_in_order() {
        let sources = vec![
            ConfigSource {
                path: PathBuf::from("a.yaml"),
                precedence: 1,
                config: Config {
                    output_format: Some(OutputFormat::Csv),
                    tiers: Some(TierSettings {
                        high_min_ram_gb: Some(8),
                    }),
                    ..Default::default()
                },
            },
            ConfigSource {
                path: PathBuf::from("b.yaml"),
                precedence: 2,
                config: Config {
                    output_format: Some(OutputFormat::Json),
                    ..Default::default()
                },
            },
        ];

        let merged = ConfigMerger::merge(sources);
        assert_eq!(merged.output_format, Some(OutputFormat::Json));
        assert_eq!(merged.high_min_ram_gb(), 8);
    }
}
