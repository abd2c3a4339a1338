//! Error types for the loaner library.
//!
//! This module provides the error hierarchy for every operation in the
//! loaner library, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Result type alias for operations that may fail with a loaner error.
///
/// # Examples
///
/// ```
/// use loaner::{Error, Result};
///
/// fn example_operation() -> Result<u32> {
///     Ok(16)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the loaner library.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition was violated.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field or entity that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },

    /// A state machine rejected a transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another caller committed a conflicting change first.
    #[error("concurrency conflict: {details}")]
    ConcurrencyConflict {
        /// Details about the conflict.
        details: String,
    },

    /// No pooled connection could be acquired.
    #[error("no database connection available after {attempts} attempt(s)")]
    ConnectionUnavailable {
        /// The number of acquisition attempts made.
        attempts: u32,
    },

    /// The worker pool job queue is full.
    #[error("worker pool is saturated")]
    WorkerPoolSaturated,

    /// The worker pool has been shut down.
    #[error("worker pool is closed")]
    WorkerPoolClosed,

    /// An unsupported schema version was encountered.
    #[error("unsupported schema version: expected {expected}, found {found}")]
    UnsupportedSchemaVersion {
        /// The expected schema version.
        expected: i32,
        /// The schema version found in the database.
        found: i32,
    },

    /// A configuration error occurred.
    #[error("configuration error: {0}")]
    Configuration(#[from] serde_yaml::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::reservation::ValidationError> for Error {
    fn from(err: crate::reservation::ValidationError) -> Self {
        Self::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for building a [`Error::NotFound`].
    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Check if the error came from the persistence layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use loaner::Error;
    ///
    /// let err = Error::ConnectionUnavailable { attempts: 3 };
    /// assert!(err.is_persistence());
    /// ```
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::ConnectionUnavailable { .. }
        )
    }

    /// Check if the error is a rejected precondition.
    ///
    /// # Examples
    ///
    /// ```
    /// use loaner::Error;
    ///
    /// let err = Error::Validation {
    ///     field: "device".into(),
    ///     message: "device is loaned".into(),
    /// };
    /// assert!(err.is_validation());
    /// ```
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if the error indicates a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
