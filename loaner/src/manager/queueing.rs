//! Waitlist workflows: join, leave and clear a tier queue.

use std::thread;
use std::time::SystemTime;

use serde::Serialize;

use crate::database::EnqueueCommit;
use crate::error::{Error, Result};
use crate::requester::RequesterId;
use crate::reservation::Reservation;
use crate::Tier;

use super::ReservationManager;

/// Rounds of "reserve, else enqueue" before giving up on a churning tier.
const MAX_ENQUEUE_ROUNDS: usize = 16;

/// What [`ReservationManager::add_to_queue`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueueOutcome {
    /// A device was free, so the requester got it right away.
    Reserved(Reservation),
    /// The requester now waits at `position` (0-based) of `tier`.
    Enqueued {
        /// The queue joined.
        tier: Tier,
        /// Position in that queue.
        position: usize,
    },
    /// Nothing done: the requester holds a device.
    AlreadyHoldsDevice,
    /// Nothing done: the requester already waits in `tier`.
    AlreadyQueued {
        /// The queue the requester waits in.
        tier: Tier,
    },
}

impl ReservationManager {
    /// Puts a requester on the waitlist of the tier they need.
    ///
    /// The requester's own tier need wins over `tier`. If a device of that
    /// tier is free the requester is served immediately instead. Calling
    /// this twice queues the requester once.
    ///
    /// # Errors
    ///
    /// - a validation error for an unknown requester
    /// - [`Error::ConcurrencyConflict`] if free devices kept being taken by
    ///   others while this call tried to reserve one
    /// - a persistence error, after publishing an operation error event
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use loaner::{ReservationManager, NewRequester, QueueOutcome, Tier};
    /// # fn demo(manager: &ReservationManager) -> loaner::Result<()> {
    /// let bob = manager.register_requester(NewRequester::new("Bob", Tier::Low))?;
    /// match manager.add_to_queue(bob.id(), Tier::Low)? {
    ///     QueueOutcome::Reserved(r) => println!("got device {}", r.device_id()),
    ///     QueueOutcome::Enqueued { position, .. } => println!("waiting at {position}"),
    ///     other => println!("{other:?}"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_to_queue(&self, requester_id: RequesterId, tier: Tier) -> Result<QueueOutcome> {
        let requester = self
            .requester(requester_id)
            .ok_or_else(|| Self::unknown_requester(requester_id))?;
        if requester.holds_device() {
            log::debug!("requester {requester_id} holds a device; not queued");
            return Ok(QueueOutcome::AlreadyHoldsDevice);
        }
        if let Some((queued, _)) = self.queue_position(requester_id) {
            log::debug!("requester {requester_id} already waits in {queued}");
            return Ok(QueueOutcome::AlreadyQueued { tier: queued });
        }

        let target = requester.tier_needed();
        if target != tier {
            log::debug!("requester {requester_id} needs {target}, not {tier}; redirected");
        }

        for _ in 0..MAX_ENQUEUE_ROUNDS {
            for device in self.available_devices(target) {
                match self.reserve(device.id(), requester_id) {
                    Ok(reservation) => return Ok(QueueOutcome::Reserved(reservation)),
                    // Taken meanwhile, try the next one
                    Err(e) if e.is_validation() => {
                        log::debug!("device {} slipped away: {e}", device.id());
                    }
                    Err(e) => return Err(self.report("add to queue", e)),
                }
            }

            let queue = self.queue(target);
            let (commit, change, position) = {
                let _writes = self.queue_writes(target).lock();
                let commit = self.store.with_connection(|db| {
                    db.enqueue_requester(requester_id, target, SystemTime::now())
                });
                let (change, position) = match &commit {
                    Ok(EnqueueCommit::Enqueued(entry)) => (
                        queue.enqueue_deferred(entry.clone()),
                        queue.position(requester_id),
                    ),
                    // Repairs a cache that missed a stored row of this tier
                    Ok(EnqueueCommit::AlreadyQueued(entry)) if entry.tier == target => {
                        (queue.enqueue_deferred(entry.clone()), None)
                    }
                    _ => (None, None),
                };
                (commit, change, position)
            };
            if let Some(change) = change {
                change.publish();
            }

            match commit.map_err(|e| self.report("add to queue", e))? {
                EnqueueCommit::Enqueued(_) => {
                    let position = position.unwrap_or_default();
                    log::info!("requester {requester_id} queued for {target} at {position}");
                    return Ok(QueueOutcome::Enqueued {
                        tier: target,
                        position,
                    });
                }
                EnqueueCommit::AlreadyQueued(entry) => {
                    return Ok(QueueOutcome::AlreadyQueued { tier: entry.tier });
                }
                EnqueueCommit::HoldsDevice => return Ok(QueueOutcome::AlreadyHoldsDevice),
                EnqueueCommit::DeviceAvailable(device_id) => {
                    log::debug!("device {device_id} freed while queueing {requester_id}; retrying");
                    thread::yield_now();
                }
            }
        }

        Err(self.report(
            "add to queue",
            Error::ConcurrencyConflict {
                details: format!("{target} devices kept changing while queueing {requester_id}"),
            },
        ))
    }

    /// Takes a requester off the `tier` waitlist.
    ///
    /// Returns `true` only if the entry was present in both the store and the
    /// in-memory queue.
    ///
    /// # Errors
    ///
    /// Returns a persistence error, after publishing an operation error event.
    pub fn remove_from_queue(&self, requester_id: RequesterId, tier: Tier) -> Result<bool> {
        let queue = self.queue(tier);
        let (stored, change) = {
            let _writes = self.queue_writes(tier).lock();
            let stored = self
                .store
                .with_connection(|db| db.remove_queue_entry(requester_id, tier));
            let change = if stored.is_ok() {
                queue.remove_deferred(requester_id)
            } else {
                None
            };
            (stored, change)
        };
        let mirrored = change.is_some();
        if let Some(change) = change {
            change.publish();
        }
        let stored = stored.map_err(|e| self.report("remove from queue", e))?;

        if stored != mirrored {
            log::warn!(
                "requester {requester_id} in {tier}: store had it {stored}, cache had it {mirrored}"
            );
        } else if stored {
            log::info!("requester {requester_id} left the {tier} queue");
        }
        Ok(stored && mirrored)
    }

    /// Empties the `tier` waitlist and returns how many entries the store
    /// held.
    ///
    /// # Errors
    ///
    /// Returns a persistence error, after publishing an operation error event.
    pub fn clear_queue(&self, tier: Tier) -> Result<usize> {
        let queue = self.queue(tier);
        let (removed, mirrored, change) = {
            let _writes = self.queue_writes(tier).lock();
            match self.store.with_connection(|db| db.clear_queue(tier)) {
                Ok(removed) => {
                    let (mirrored, change) = queue.clear_deferred();
                    (Ok(removed), mirrored, change)
                }
                Err(e) => (Err(e), Vec::new(), None),
            }
        };
        if let Some(change) = change {
            change.publish();
        }
        let removed = removed.map_err(|e| self.report("clear queue", e))?;

        if removed.len() != mirrored.len() {
            log::warn!(
                "cleared {} stored and {} cached entries from {tier}",
                removed.len(),
                mirrored.len()
            );
        }
        log::info!("cleared {} entries from the {tier} queue", removed.len());
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::database::Database;
    use crate::events::ReservationEvent;

    #[test]
    fn test_enqueue_when_no_device_is_free() {
        let h = harness();
        let device = high_device(&h.manager);
        let r1 = requester(&h.manager, "R1", Tier::High);
        let r2 = requester(&h.manager, "R2", Tier::High);
        h.manager.create_reservation(device.id(), r1.id()).unwrap();

        let outcome = h.manager.add_to_queue(r2.id(), Tier::High).unwrap();

        assert_eq!(
            outcome,
            QueueOutcome::Enqueued {
                tier: Tier::High,
                position: 0
            }
        );
        assert_eq!(h.manager.queue_size(Tier::High), 1);
        assert_eq!(h.manager.queue_position(r2.id()), Some((Tier::High, 0)));
        assert_eq!(h.manager.queue_size(Tier::Low), 0);
        assert_eq!(
            h.events.lock().last(),
            Some(&ReservationEvent::QueueSizeChanged {
                tier: Tier::High,
                old_size: 0,
                new_size: 1
            })
        );
    }

    #[test]
    fn test_enqueue_twice_is_idempotent() {
        let h = harness();
        let r = requester(&h.manager, "R", Tier::Low);

        h.manager.add_to_queue(r.id(), Tier::Low).unwrap();
        let second = h.manager.add_to_queue(r.id(), Tier::Low).unwrap();

        assert_eq!(second, QueueOutcome::AlreadyQueued { tier: Tier::Low });
        assert_eq!(h.manager.queue_size(Tier::Low), 1);
        let stored = h
            .manager
            .store()
            .with_connection(|db| Database::list_queue(db.connection(), Tier::Low))
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_tier_need_overrides_argument() {
        let h = harness();
        let r = requester(&h.manager, "R", Tier::Low);

        let outcome = h.manager.add_to_queue(r.id(), Tier::High).unwrap();

        assert_eq!(
            outcome,
            QueueOutcome::Enqueued {
                tier: Tier::Low,
                position: 0
            }
        );
        assert_eq!(h.manager.queue_size(Tier::High), 0);
    }

    #[test]
    fn test_free_device_bypasses_queue() {
        let h = harness();
        let device = low_device(&h.manager);
        let r = requester(&h.manager, "R", Tier::Low);

        let outcome = h.manager.add_to_queue(r.id(), Tier::Low).unwrap();

        let QueueOutcome::Reserved(reservation) = outcome else {
            panic!("expected a reservation, got {outcome:?}");
        };
        assert_eq!(reservation.device_id(), device.id());
        assert_eq!(h.manager.queue_size(Tier::Low), 0);
        assert!(h.manager.requester(r.id()).unwrap().holds_device());
    }

    #[test]
    fn test_holder_is_not_queued() {
        let h = harness();
        let device = high_device(&h.manager);
        let r = requester(&h.manager, "R", Tier::High);
        h.manager.create_reservation(device.id(), r.id()).unwrap();

        assert_eq!(
            h.manager.add_to_queue(r.id(), Tier::High).unwrap(),
            QueueOutcome::AlreadyHoldsDevice
        );
        assert_eq!(h.manager.queue_size(Tier::High), 0);
    }

    #[test]
    fn test_unknown_requester_is_rejected() {
        let h = harness();
        let err = h.manager.add_to_queue(RequesterId(5), Tier::High).unwrap_err();
        assert!(err.is_validation());
        assert!(h.events.lock().is_empty());
    }

    #[test]
    fn test_remove_absent_requester_has_no_effect() {
        let h = harness();
        let r2 = requester(&h.manager, "R2", Tier::High);
        h.events.lock().clear();

        assert!(!h.manager.remove_from_queue(r2.id(), Tier::High).unwrap());
        assert_eq!(h.manager.queue_size(Tier::High), 0);
        assert!(h.events.lock().is_empty());
    }

    #[test]
    fn test_remove_queued_requester() {
        let h = harness();
        let a = requester(&h.manager, "A", Tier::Low);
        let b = requester(&h.manager, "B", Tier::Low);
        h.manager.add_to_queue(a.id(), Tier::Low).unwrap();
        h.manager.add_to_queue(b.id(), Tier::Low).unwrap();

        assert!(h.manager.remove_from_queue(a.id(), Tier::Low).unwrap());
        assert_eq!(h.manager.queue_position(b.id()), Some((Tier::Low, 0)));
        // Wrong tier is simply absent
        assert!(!h.manager.remove_from_queue(b.id(), Tier::High).unwrap());
        assert_eq!(h.manager.queue_size(Tier::Low), 1);
    }

    #[test]
    fn test_fifo_assignment_order() {
        let h = harness();
        let names = ["A", "B", "C"];
        let waiting: Vec<_> = names
            .iter()
            .map(|name| requester(&h.manager, name, Tier::High))
            .collect();
        for r in &waiting {
            h.manager.add_to_queue(r.id(), Tier::High).unwrap();
        }

        for expected in &waiting {
            let device = high_device(&h.manager);
            let active = h.manager.active_reservations();
            let got = active
                .iter()
                .find(|r| r.device_id() == device.id())
                .map(Reservation::requester_id);
            assert_eq!(got, Some(expected.id()));
        }
        assert_eq!(h.manager.queue_size(Tier::High), 0);
    }

    #[test]
    fn test_clear_queue() {
        let h = harness();
        for name in ["A", "B"] {
            let r = requester(&h.manager, name, Tier::High);
            h.manager.add_to_queue(r.id(), Tier::High).unwrap();
        }
        h.events.lock().clear();

        assert_eq!(h.manager.clear_queue(Tier::High).unwrap(), 2);
        assert_eq!(h.manager.queue_size(Tier::High), 0);
        assert_eq!(
            *h.events.lock(),
            vec![ReservationEvent::QueueSizeChanged {
                tier: Tier::High,
                old_size: 2,
                new_size: 0
            }]
        );
        assert_eq!(h.manager.clear_queue(Tier::High).unwrap(), 0);
    }
}
