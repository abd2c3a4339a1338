//! Consistency audit of the persisted rows and the manager caches.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::database::Database;
use crate::device::DeviceState;
use crate::error::Result;
use crate::Tier;

use super::ReservationManager;

/// One broken invariant found by [`ReservationManager::verify_consistency`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// The entity concerned, such as `device 3`.
    pub subject: String,
    /// What is wrong with it.
    pub problem: String,
}

impl Violation {
    fn new(subject: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.problem)
    }
}

impl ReservationManager {
    /// Checks the data-model invariants and returns every violation found.
    ///
    /// The stored rows are read in one transaction and checked against each
    /// other, then every cache is compared with them.
    /// An empty list means the engine is consistent.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the store cannot be read.
    pub fn verify_consistency(&self) -> Result<Vec<Violation>> {
        let (devices, requesters, active, high, low) = self.persist("verify consistency", |db| {
            db.with_transaction(|tx| {
                Ok((
                    Database::list_devices(tx)?,
                    Database::list_requesters(tx)?,
                    Database::list_active_reservations(tx)?,
                    Database::list_queue(tx, Tier::High)?,
                    Database::list_queue(tx, Tier::Low)?,
                ))
            })
        })?;

        let mut violations = Vec::new();

        let mut by_device: HashMap<_, usize> = HashMap::new();
        let mut by_requester: HashMap<_, usize> = HashMap::new();
        for reservation in &active {
            *by_device.entry(reservation.device_id()).or_default() += 1;
            *by_requester.entry(reservation.requester_id()).or_default() += 1;
        }

        for device in &devices {
            let count = by_device.get(&device.id()).copied().unwrap_or(0);
            let loaned = device.state() == DeviceState::Loaned;
            let subject = format!("device {}", device.id());
            if loaned && count == 0 {
                violations.push(Violation::new(
                    &subject,
                    "loaned without an active reservation",
                ));
            }
            if !loaned && count > 0 {
                violations.push(Violation::new(&subject, "available but actively reserved"));
            }
            if count > 1 {
                violations.push(Violation::new(
                    &subject,
                    format!("{count} active reservations"),
                ));
            }
        }

        let needs: HashMap<_, _> = requesters
            .iter()
            .map(|r| (r.id(), (r.tier_needed(), r.holds_device())))
            .collect();
        for requester in &requesters {
            let count = by_requester.get(&requester.id()).copied().unwrap_or(0);
            let subject = format!("requester {}", requester.id());
            if requester.holds_device() && count == 0 {
                violations.push(Violation::new(
                    &subject,
                    "holds a device without an active reservation",
                ));
            }
            if !requester.holds_device() && count > 0 {
                violations.push(Violation::new(
                    &subject,
                    "actively reserved but not holding",
                ));
            }
            if count > 1 {
                violations.push(Violation::new(
                    &subject,
                    format!("{count} active reservations"),
                ));
            }
        }

        let mut seen = HashSet::new();
        for entry in high.iter().chain(&low) {
            let subject = format!("requester {}", entry.requester_id);
            if !seen.insert(entry.requester_id) {
                violations.push(Violation::new(&subject, "queued more than once"));
            }
            match needs.get(&entry.requester_id) {
                Some((_, true)) => {
                    violations.push(Violation::new(&subject, "queued while holding a device"));
                }
                Some((needed, false)) if *needed != entry.tier => {
                    violations.push(Violation::new(
                        &subject,
                        format!("needs {needed} but waits in {}", entry.tier),
                    ));
                }
                Some(_) => {}
                None => violations.push(Violation::new(&subject, "queued but unknown")),
            }
        }

        {
            let cached = self.devices.read();
            for device in &devices {
                let subject = format!("device {}", device.id());
                match cached.get(&device.id()) {
                    None => violations.push(Violation::new(&subject, "missing from cache")),
                    Some(c) if c.value.state() != device.state() => {
                        violations.push(Violation::new(
                            &subject,
                            format!(
                                "cache says {}, store says {}",
                                c.value.state(),
                                device.state()
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
            let stored: HashSet<_> = devices.iter().map(|d| d.id()).collect();
            for id in cached.keys().filter(|id| !stored.contains(*id)) {
                violations.push(Violation::new(format!("device {id}"), "cached but not stored"));
            }
        }

        {
            let cached = self.requesters.read();
            for requester in &requesters {
                let subject = format!("requester {}", requester.id());
                match cached.get(&requester.id()) {
                    None => violations.push(Violation::new(&subject, "missing from cache")),
                    Some(c) if c.value.holds_device() != requester.holds_device() => {
                        violations.push(Violation::new(
                            &subject,
                            format!(
                                "cache says holding {}, store says {}",
                                c.value.holds_device(),
                                requester.holds_device()
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
            for id in cached.keys().filter(|id| !needs.contains_key(*id)) {
                violations.push(Violation::new(
                    format!("requester {id}"),
                    "cached but not stored",
                ));
            }
        }

        let mut stored_ids: Vec<_> = active.iter().map(|r| r.id()).collect();
        stored_ids.sort_unstable();
        let mut cached_ids: Vec<_> = self.active.read().keys().copied().collect();
        cached_ids.sort_unstable();
        if stored_ids != cached_ids {
            violations.push(Violation::new(
                "active set",
                format!("cache holds {cached_ids:?}, store holds {stored_ids:?}"),
            ));
        }

        for (tier, stored) in [(Tier::High, &high), (Tier::Low, &low)] {
            let stored: Vec<_> = stored.iter().map(|e| e.requester_id).collect();
            let cached: Vec<_> = self
                .queue(tier)
                .snapshot()
                .iter()
                .map(|e| e.requester_id)
                .collect();
            if stored != cached {
                violations.push(Violation::new(
                    format!("{tier} queue"),
                    format!("cache order {cached:?}, store order {stored:?}"),
                ));
            }
        }

        if violations.is_empty() {
            log::debug!("consistency audit passed");
        } else {
            for violation in &violations {
                log::warn!("consistency violation: {violation}");
            }
        }
        Ok(violations)
    }
}
