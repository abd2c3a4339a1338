//! Performance tiers shared by devices and requesters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Performance class of a device, or the class a requester needs.
///
/// # Examples
///
/// ```
/// use loaner::Tier;
///
/// let tier: Tier = "high".parse().unwrap();
/// assert_eq!(tier, Tier::High);
/// assert_eq!(tier.as_str(), "high");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// High performance need (development, media work).
    High,
    /// Low performance need (office work, browsing).
    Low,
}

impl Tier {
    /// Both tiers, in a stable order.
    pub const ALL: [Self; 2] = [Self::High, Self::Low];

    /// Returns the lowercase storage name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Classifies a device by its memory size.
    ///
    /// Devices with at least `high_min_ram_gb` of RAM are [`Tier::High`].
    ///
    /// # Examples
    ///
    /// ```
    /// use loaner::Tier;
    ///
    /// assert_eq!(Tier::classify(32, 16), Tier::High);
    /// assert_eq!(Tier::classify(8, 16), Tier::Low);
    /// ```
    #[must_use]
    pub const fn classify(ram_gb: u32, high_min_ram_gb: u32) -> Self {
        if ram_gb >= high_min_ram_gb {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            _ => Err(Error::validation("tier", format!("unknown tier '{s}'"))),
        }
    }
}
