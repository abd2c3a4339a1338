//! Devices and their availability state machine.
//!
//! A device is either [`DeviceState::Available`] or [`DeviceState::Loaned`].
//! Transitions are listed as data in [`DEVICE_TRANSITIONS`] so that every
//! legal move can be audited in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reservation::ValidationError;
use crate::Tier;

/// Store-assigned identifier of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Availability of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// The device can be loaned.
    Available,
    /// The device is bound to an active reservation.
    Loaned,
}

/// What happened to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTrigger {
    /// A reservation was created for the device.
    Loan,
    /// The reservation holding the device reached a terminal status.
    Return,
}

/// Every legal `(from, trigger) -> to` move of the device state machine.
pub const DEVICE_TRANSITIONS: &[(DeviceState, DeviceTrigger, DeviceState)] = &[
    (DeviceState::Available, DeviceTrigger::Loan, DeviceState::Loaned),
    (DeviceState::Loaned, DeviceTrigger::Return, DeviceState::Available),
];

impl DeviceState {
    /// Returns the lowercase storage name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Loaned => "loaned",
        }
    }

    /// Applies a trigger, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the pair is not in
    /// [`DEVICE_TRANSITIONS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use loaner::device::{DeviceState, DeviceTrigger};
    ///
    /// let next = DeviceState::Available.apply(DeviceTrigger::Loan).unwrap();
    /// assert_eq!(next, DeviceState::Loaned);
    /// assert!(DeviceState::Available.apply(DeviceTrigger::Return).is_err());
    /// ```
    pub fn apply(self, trigger: DeviceTrigger) -> Result<Self> {
        DEVICE_TRANSITIONS
            .iter()
            .find(|(from, t, _)| *from == self && *t == trigger)
            .map(|(_, _, to)| *to)
            .ok_or_else(|| Error::InvalidTransition {
                from: self.to_string(),
                to: format!("{trigger:?}").to_lowercase(),
            })
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(Self::Available),
            "loaned" => Ok(Self::Loaned),
            _ => Err(Error::validation("device.state", format!("unknown state '{s}'"))),
        }
    }
}

/// A loanable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    id: DeviceId,
    brand: String,
    model: String,
    capacity_gb: u32,
    ram_gb: u32,
    tier: Tier,
    state: DeviceState,
}

impl Device {
    /// Assembles a device from stored fields.
    #[must_use]
    pub(crate) fn from_parts(id: DeviceId, new_device: NewDevice, state: DeviceState) -> Self {
        Self {
            id,
            brand: new_device.brand,
            model: new_device.model,
            capacity_gb: new_device.capacity_gb,
            ram_gb: new_device.ram_gb,
            tier: new_device.tier,
            state,
        }
    }

    /// Returns the device id.
    #[must_use]
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the brand.
    #[must_use]
    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the storage capacity in gigabytes.
    #[must_use]
    pub const fn capacity_gb(&self) -> u32 {
        self.capacity_gb
    }

    /// Returns the memory size in gigabytes.
    #[must_use]
    pub const fn ram_gb(&self) -> u32 {
        self.ram_gb
    }

    /// Returns the performance tier.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Returns the availability state.
    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Returns `true` if the device can be loaned.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state == DeviceState::Available
    }

    /// Returns a copy of this device after applying `trigger`.
    ///
    /// Caches replace devices wholesale, so this never mutates `self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for an illegal move.
    pub fn transitioned(&self, trigger: DeviceTrigger) -> Result<Self> {
        let state = self.state.apply(trigger)?;
        Ok(Self {
            state,
            ..self.clone()
        })
    }
}

/// Provisioning input for a new device.
///
/// # Examples
///
/// ```
/// use loaner::{NewDevice, Tier};
///
/// let new_device = NewDevice::new("Lenovo", "ThinkPad X1", 512, 32, Tier::High);
/// assert!(new_device.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    /// Manufacturer.
    pub brand: String,
    /// Model name.
    pub model: String,
    /// Storage capacity in gigabytes.
    pub capacity_gb: u32,
    /// Memory size in gigabytes.
    pub ram_gb: u32,
    /// Performance tier.
    pub tier: Tier,
}

impl NewDevice {
    /// Creates provisioning input, trimming the text fields.
    #[must_use]
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        capacity_gb: u32,
        ram_gb: u32,
        tier: Tier,
    ) -> Self {
        Self {
            brand: brand.into().trim().to_string(),
            model: model.into().trim().to_string(),
            capacity_gb,
            ram_gb,
            tier,
        }
    }

    /// Checks the provisioning input.
    ///
    /// # Errors
    ///
    /// Returns an error if brand or model is empty, or a size is zero.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.brand.trim().is_empty() {
            return Err(ValidationError::new("brand", "brand must be non-empty"));
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::new("model", "model must be non-empty"));
        }
        if self.capacity_gb == 0 {
            return Err(ValidationError::new(
                "capacity_gb",
                "capacity must be greater than 0",
            ));
        }
        if self.ram_gb == 0 {
            return Err(ValidationError::new("ram_gb", "RAM must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Device {
        Device::from_parts(
            DeviceId(1),
            NewDevice::new("Dell", "XPS 15", 1024, 32, Tier::High),
            DeviceState::Available,
        )
    }

    #[test]
    fn test_transition_table_is_closed() {
        assert_eq!(
            DeviceState::Available.apply(DeviceTrigger::Loan).unwrap(),
            DeviceState::Loaned
        );
        assert_eq!(
            DeviceState::Loaned.apply(DeviceTrigger::Return).unwrap(),
            DeviceState::Available
        );
        assert!(DeviceState::Loaned.apply(DeviceTrigger::Loan).is_err());
        assert!(DeviceState::Available.apply(DeviceTrigger::Return).is_err());
    }

    #[test]
    fn test_transitioned_leaves_original_untouched() {
        let device = sample();
        let loaned = device.transitioned(DeviceTrigger::Loan).unwrap();
        assert!(device.is_available());
        assert_eq!(loaned.state(), DeviceState::Loaned);
        assert_eq!(loaned.id(), device.id());
        assert_eq!(loaned.model(), "XPS 15");
    }

    #[test]
    fn test_state_round_trips_through_storage_name() {
        for state in [DeviceState::Available, DeviceState::Loaned] {
            assert_eq!(state.as_str().parse::<DeviceState>().unwrap(), state);
        }
        assert!("broken".parse::<DeviceState>().is_err());
    }

    #[test]
    fn test_new_device_trims_and_validates() {
        let new_device = NewDevice::new("  HP ", " EliteBook ", 256, 8, Tier::Low);
        assert_eq!(new_device.brand, "HP");
        assert_eq!(new_device.model, "EliteBook");
        assert!(new_device.validate().is_ok());

        let err = NewDevice::new("  ", "x", 1, 1, Tier::Low)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "brand");

        let err = NewDevice::new("HP", "x", 1, 0, Tier::Low)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "ram_gb");
    }
}
