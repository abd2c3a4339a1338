//! Reservation types binding one device to one requester.
//!
//! This module provides the reservation record, its status lifecycle and a
//! builder for construction from fresh input or stored rows.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::{DeviceId, RequesterId};

#[cfg(all(test, feature = "property-tests"))]
mod proptests;

/// Store-assigned identifier of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a reservation.
///
/// The only legal moves are `Active -> Completed` and `Active -> Cancelled`.
/// Both terminal states are final.
///
/// # Examples
///
/// ```
/// use loaner::ReservationStatus;
///
/// assert!(ReservationStatus::Active.can_transition_to(ReservationStatus::Completed));
/// assert!(!ReservationStatus::Cancelled.can_transition_to(ReservationStatus::Active));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// The requester currently holds the device.
    Active,
    /// The device was returned.
    Completed,
    /// The reservation was withdrawn.
    Cancelled,
}

impl ReservationStatus {
    /// Returns the lowercase storage name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for `Completed` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if moving from `self` to `next` is allowed.
    ///
    /// Staying in the same status is not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Completed) | (Self::Active, Self::Cancelled)
        )
    }

    /// Checks a transition, returning an error for illegal moves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless `can_transition_to` holds.
    pub fn check_transition(self, next: Self) -> crate::Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(Error::validation("status", format!("unknown status '{s}'"))),
        }
    }
}

/// A binding of one device to one requester.
///
/// # Examples
///
/// ```
/// use loaner::{DeviceId, RequesterId, Reservation, ReservationId, ReservationStatus};
///
/// let reservation = Reservation::builder(ReservationId(1), DeviceId(10), RequesterId(20))
///     .build()
///     .unwrap();
///
/// assert_eq!(reservation.status(), ReservationStatus::Active);
/// assert_eq!(reservation.device_id(), DeviceId(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    device_id: DeviceId,
    requester_id: RequesterId,
    status: ReservationStatus,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl Reservation {
    /// Creates a new reservation builder.
    #[must_use]
    pub fn builder(
        id: ReservationId,
        device_id: DeviceId,
        requester_id: RequesterId,
    ) -> ReservationBuilder {
        ReservationBuilder {
            id,
            device_id,
            requester_id,
            status: ReservationStatus::Active,
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns the reservation id.
    #[must_use]
    pub const fn id(&self) -> ReservationId {
        self.id
    }

    /// Returns the loaned device.
    #[must_use]
    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Returns the requester holding the device.
    #[must_use]
    pub const fn requester_id(&self) -> RequesterId {
        self.requester_id
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ReservationStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns the time of the last status change.
    #[must_use]
    pub const fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    /// Returns `true` while the reservation holds its device.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Returns a copy carrying `status`, stamped at `at`.
    #[must_use]
    pub fn with_status(&self, status: ReservationStatus, at: SystemTime) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

/// Builder for creating `Reservation` instances.
#[derive(Debug)]
pub struct ReservationBuilder {
    id: ReservationId,
    device_id: DeviceId,
    requester_id: RequesterId,
    status: ReservationStatus,
    created_at: Option<SystemTime>,
    updated_at: Option<SystemTime>,
}

impl ReservationBuilder {
    /// Sets the status (defaults to `Active`).
    #[must_use]
    pub const fn status(mut self, status: ReservationStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the last status change timestamp.
    #[must_use]
    pub fn updated_at(mut self, updated_at: SystemTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the reservation.
    ///
    /// Missing timestamps default to now; `updated_at` defaults to
    /// `created_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if `updated_at` is earlier than `created_at`.
    pub fn build(self) -> Result<Reservation, ValidationError> {
        let created_at = self.created_at.unwrap_or_else(SystemTime::now);
        let updated_at = self.updated_at.unwrap_or(created_at);

        if updated_at < created_at {
            return Err(ValidationError::new(
                "updated_at",
                "updated_at cannot be earlier than created_at",
            ));
        }

        Ok(Reservation {
            id: self.id,
            device_id: self.device_id,
            requester_id: self.requester_id,
            status: self.status,
            created_at,
            updated_at,
        })
    }
}

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// A description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}
