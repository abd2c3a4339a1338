//! Requesters (students) who borrow devices.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reservation::ValidationError;
use crate::Tier;

/// Store-assigned identifier of a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A party that may hold one device at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    id: RequesterId,
    name: String,
    tier_needed: Tier,
    holds_device: bool,
}

impl Requester {
    pub(crate) fn from_parts(
        id: RequesterId,
        new_requester: NewRequester,
        holds_device: bool,
    ) -> Self {
        Self {
            id,
            name: new_requester.name,
            tier_needed: new_requester.tier_needed,
            holds_device,
        }
    }

    /// Returns the requester id.
    #[must_use]
    pub const fn id(&self) -> RequesterId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tier this requester needs.
    #[must_use]
    pub const fn tier_needed(&self) -> Tier {
        self.tier_needed
    }

    /// Returns `true` while an active reservation references this requester.
    #[must_use]
    pub const fn holds_device(&self) -> bool {
        self.holds_device
    }

    /// Returns a copy with the holds-device flag replaced.
    #[must_use]
    pub fn with_holds_device(&self, holds_device: bool) -> Self {
        Self {
            holds_device,
            ..self.clone()
        }
    }
}

/// Provisioning input for a new requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequester {
    /// Display name.
    pub name: String,
    /// Tier the requester needs.
    pub tier_needed: Tier,
}

impl NewRequester {
    /// Creates provisioning input, trimming the name.
    #[must_use]
    pub fn new(name: impl Into<String>, tier_needed: Tier) -> Self {
        Self {
            name: name.into().trim().to_string(),
            tier_needed,
        }
    }

    /// Checks the provisioning input.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or longer than 255 characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "name must be non-empty"));
        }
        if name.len() > 255 {
            return Err(ValidationError::new(
                "name",
                "name cannot exceed 255 characters",
            ));
        }
        Ok(())
    }
}
