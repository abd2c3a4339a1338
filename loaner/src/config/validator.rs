//! Configuration validation.

use crate::config::schema::{Config, PoolSettings};
use crate::error::{Error, Result};

/// Validates configuration values.
///
/// # Examples
///
/// ```
/// use loaner::config::{Config, ConfigValidator};
///
/// ConfigValidator::validate(&Config::with_defaults()).unwrap();
/// ```
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Checks that counts and timeouts are positive and the backoff bounds
    /// are ordered. Unset fields are fine.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(config: &Config) -> Result<()> {
        if let Some(ref db) = config.database {
            Self::positive("database.busy_timeout_ms", db.busy_timeout_ms)?;
        }

        if let Some(ref pool) = config.pool {
            Self::validate_pool(pool)?;
        }

        if let Some(ref workers) = config.workers {
            Self::positive("workers.threads", workers.threads)?;
            Self::positive("workers.queue_capacity", workers.queue_capacity)?;
        }

        if let Some(ref tiers) = config.tiers {
            Self::positive("tiers.high_min_ram_gb", tiers.high_min_ram_gb)?;
        }

        Ok(())
    }

    fn validate_pool(pool: &PoolSettings) -> Result<()> {
        Self::positive("pool.max_connections", pool.max_connections)?;
        Self::positive("pool.acquire_attempts", pool.acquire_attempts)?;
        Self::positive("pool.initial_backoff_ms", pool.initial_backoff_ms)?;
        Self::positive("pool.max_backoff_ms", pool.max_backoff_ms)?;

        if let (Some(initial), Some(max)) = (pool.initial_backoff_ms, pool.max_backoff_ms) {
            if initial > max {
                return Err(Error::validation(
                    "pool",
                    format!("initial_backoff_ms ({initial}) must not exceed max_backoff_ms ({max})"),
                ));
            }
        }
        Ok(())
    }

    fn positive<T>(field: &str, value: Option<T>) -> Result<()>
    where
        T: PartialEq + Default,
    {
        match value {
            Some(v) if v == T::default() => Err(Error::validation(field, "must be greater than 0")),
            _ => Ok(()),
        }
    }
}
