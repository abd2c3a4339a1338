//! Reservation workflows: create, change status, assign from the queue.

use std::time::SystemTime;

use crate::database::{ReservationCommit, StatusCommit};
use crate::device::DeviceId;
use crate::error::{Error, Result};
use crate::events::ReservationEvent;
use crate::queue::QueueEntry;
use crate::requester::RequesterId;
use crate::reservation::{Reservation, ReservationId, ReservationStatus};

use super::{mirror, ReservationManager};

impl ReservationManager {
    /// Loans `device_id` to `requester_id`.
    ///
    /// Publishes [`ReservationEvent::ReservationCreated`] after the commit.
    /// If the requester was waiting in a queue, the entry is removed in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// - a validation error if either id is unknown, the device is not
    ///   available or the requester already holds a device (including a lost
    ///   race detected inside the transaction)
    /// - a persistence error, after publishing an operation error event
    pub fn create_reservation(
        &self,
        device_id: DeviceId,
        requester_id: RequesterId,
    ) -> Result<Reservation> {
        self.reserve(device_id, requester_id)
            .map_err(|e| self.report("create reservation", e))
    }

    /// Moves a reservation to `new_status`.
    ///
    /// Returns `false` without writing when the status is already
    /// `new_status`. A move into a terminal status frees the device and then
    /// offers it to the head of the matching queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the reservation is unknown
    /// - [`Error::InvalidTransition`] for a move out of a terminal status
    /// - [`Error::ConcurrencyConflict`] if another caller finished the
    ///   reservation first
    /// - a persistence error, after publishing an operation error event
    pub fn update_reservation_status(
        &self,
        id: ReservationId,
        new_status: ReservationStatus,
    ) -> Result<bool> {
        let seen = match self.active.read().get(&id).cloned() {
            Some(reservation) => reservation,
            None => self
                .reservation(id)
                .map_err(|e| self.report("look up reservation", e))?
                .ok_or_else(|| Error::not_found(format!("reservation {id}")))?,
        };

        if seen.status() == new_status {
            return Ok(false);
        }
        if seen.status().is_terminal() {
            seen.status().check_transition(new_status)?;
        }

        let (commit, stamp) = self.persist("update reservation status", |db| {
            let commit =
                db.commit_status_change(id, seen.status(), new_status, SystemTime::now())?;
            Ok((commit, db.last_commit()))
        })?;

        let StatusCommit::Changed {
            before,
            after,
            device,
            requester,
        } = commit
        else {
            return Ok(false);
        };

        let freed = device.as_ref().filter(|d| d.is_available()).map(|d| d.id());
        {
            let mut devices = self.devices.write();
            let mut requesters = self.requesters.write();
            let mut active = self.active.write();
            if let Some(device) = device {
                mirror(&mut devices, device.id(), device, stamp);
            }
            if let Some(requester) = requester {
                mirror(&mut requesters, requester.id(), requester, stamp);
            }
            if after.is_active() {
                active.insert(after.id(), after.clone());
            } else {
                active.remove(&after.id());
            }
        }

        log::info!(
            "reservation {id}: {} -> {}",
            before.status(),
            after.status()
        );
        self.events
            .publish(&ReservationEvent::ReservationStatusChanged {
                old_status: before.status(),
                new_status: after.status(),
                reservation: after,
            });

        if let Some(device_id) = freed {
            // The status change stands even if nobody can take the device
            if let Err(e) = self.assign_next_from_queue(device_id) {
                log::warn!("device {device_id} freed but not reassigned: {e}");
            }
        }
        Ok(true)
    }

    /// Offers an available device to the head of its tier queue.
    ///
    /// Returns `None` if the device is loaned or nobody waits. If the
    /// reservation fails after the head was popped, the entry goes back to
    /// the head of the queue with its original position, an operation error
    /// event is published and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown device, a persistence error
    /// from the pop, or the error of the failed reservation.
    pub fn assign_next_from_queue(&self, device_id: DeviceId) -> Result<Option<Reservation>> {
        let device = self
            .device(device_id)
            .ok_or_else(|| Self::unknown_device(device_id))?;
        if !device.is_available() {
            return Ok(None);
        }

        let tier = device.tier();
        let queue = self.queue(tier);
        let popped = {
            let _writes = self.queue_writes(tier).lock();
            self.store
                .with_connection(|db| db.pop_queue_front(tier))
                .map(|entry| {
                    entry.map(|entry| {
                        let change = queue.remove_deferred(entry.requester_id);
                        (entry, change)
                    })
                })
        };
        let Some((entry, change)) = popped.map_err(|e| self.report("pop queue", e))? else {
            return Ok(None);
        };
        match change {
            Some(change) => change.publish(),
            None => log::warn!(
                "requester {} was stored at the head of {tier} but missing from its cache",
                entry.requester_id
            ),
        }
        log::debug!(
            "popped requester {} from {tier} for device {device_id}",
            entry.requester_id
        );

        match self.reserve(device_id, entry.requester_id) {
            Ok(reservation) => Ok(Some(reservation)),
            Err(e) => {
                self.restore_popped(&entry);
                log::error!(
                    "assigning device {device_id} to requester {} failed: {e}",
                    entry.requester_id
                );
                self.events.publish_error(
                    format!(
                        "assigning device {device_id} to requester {} failed",
                        entry.requester_id
                    ),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// Puts a popped entry back in the store and at the head of its queue.
    fn restore_popped(&self, entry: &QueueEntry) {
        let queue = self.queue(entry.tier);
        let restored = {
            let _writes = self.queue_writes(entry.tier).lock();
            self.store
                .with_connection(|db| db.restore_queue_entry(entry))
                .map(|stored| {
                    let change = if stored {
                        queue.restore_front_deferred(entry.clone())
                    } else {
                        None
                    };
                    (stored, change)
                })
        };
        match restored {
            Ok((true, change)) => {
                if let Some(change) = change {
                    change.publish();
                }
            }
            Ok((false, _)) => log::warn!(
                "requester {} re-queued meanwhile; original entry dropped",
                entry.requester_id
            ),
            Err(e) => {
                let e = self.report("restore queue entry", e);
                log::error!("requester {} lost its queue place: {e}", entry.requester_id);
            }
        }
    }

    /// Validates, commits and mirrors a reservation without reporting.
    pub(super) fn reserve(
        &self,
        device_id: DeviceId,
        requester_id: RequesterId,
    ) -> Result<Reservation> {
        let device = self
            .device(device_id)
            .ok_or_else(|| Self::unknown_device(device_id))?;
        if !device.is_available() {
            return Err(Error::validation(
                "device",
                format!("device {device_id} is not available"),
            ));
        }
        let requester = self
            .requester(requester_id)
            .ok_or_else(|| Self::unknown_requester(requester_id))?;
        if requester.holds_device() {
            return Err(Error::validation(
                "requester",
                format!("requester {requester_id} already holds a device"),
            ));
        }

        // The commit may delete the requester's queue row
        let writes = self.queue_writes(requester.tier_needed()).lock();
        let (commit, stamp) = self.store.with_connection(|db| {
            let commit = db.commit_reservation(device_id, requester_id, SystemTime::now())?;
            Ok((commit, db.last_commit()))
        })?;
        let ReservationCommit {
            reservation,
            device,
            requester,
            dequeued,
        } = commit;

        let current = {
            let mut devices = self.devices.write();
            let mut requesters = self.requesters.write();
            let mut active = self.active.write();
            mirror(&mut requesters, requester.id(), requester, stamp);
            // A later commit on the device means this loan already ended
            let current = mirror(&mut devices, device.id(), device, stamp);
            if current {
                active.insert(reservation.id(), reservation.clone());
            }
            current
        };
        let change =
            dequeued.and_then(|entry| self.queue(entry.tier).remove_deferred(entry.requester_id));
        drop(writes);
        if let Some(change) = change {
            change.publish();
        }
        if !current {
            log::debug!(
                "reservation {} was finished before it was mirrored",
                reservation.id()
            );
        }

        log::info!(
            "reservation {}: device {device_id} loaned to requester {requester_id}",
            reservation.id()
        );
        self.events.publish(&ReservationEvent::ReservationCreated {
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::events::ReservationEvent;
    use crate::{DeviceId, RequesterId, ReservationStatus, Tier};

    #[test]
    fn test_create_reservation_loans_device() {
        let h = harness();
        let device = high_device(&h.manager);
        let ada = requester(&h.manager, "Ada", Tier::High);

        let reservation = h.manager.create_reservation(device.id(), ada.id()).unwrap();

        assert_eq!(reservation.status(), ReservationStatus::Active);
        assert!(!h.manager.device(device.id()).unwrap().is_available());
        assert!(h.manager.requester(ada.id()).unwrap().holds_device());
        assert_eq!(h.manager.active_reservations(), vec![reservation.clone()]);
        assert_eq!(
            h.events.lock().last(),
            Some(&ReservationEvent::ReservationCreated { reservation })
        );
    }

    #[test]
    fn test_create_reservation_rejects_without_side_effects() {
        let h = harness();
        let device = high_device(&h.manager);
        let ada = requester(&h.manager, "Ada", Tier::High);
        let bob = requester(&h.manager, "Bob", Tier::High);
        h.manager.create_reservation(device.id(), ada.id()).unwrap();
        let before = h.events.lock().len();

        let loaned = h.manager.create_reservation(device.id(), bob.id()).unwrap_err();
        assert!(loaned.is_validation());
        let unknown_device = h.manager.create_reservation(DeviceId(99), bob.id()).unwrap_err();
        assert!(unknown_device.is_validation());
        let unknown_requester = h
            .manager
            .create_reservation(device.id(), RequesterId(99))
            .unwrap_err();
        assert!(unknown_requester.is_validation());

        let other = high_device(&h.manager);
        let holder = h.manager.create_reservation(other.id(), ada.id()).unwrap_err();
        assert!(holder.is_validation());
        assert!(h.manager.device(other.id()).unwrap().is_available());

        assert!(!h.manager.requester(bob.id()).unwrap().holds_device());
        assert_eq!(h.manager.active_reservations().len(), 1);
        assert_eq!(h.events.lock().len(), before);
    }

    #[test]
    fn test_cancel_round_trip_restores_state() {
        let h = harness();
        let device = low_device(&h.manager);
        let ada = requester(&h.manager, "Ada", Tier::Low);
        let reservation = h.manager.create_reservation(device.id(), ada.id()).unwrap();

        assert!(h
            .manager
            .update_reservation_status(reservation.id(), ReservationStatus::Cancelled)
            .unwrap());

        assert!(h.manager.device(device.id()).unwrap().is_available());
        assert!(!h.manager.requester(ada.id()).unwrap().holds_device());
        assert!(h.manager.active_reservations().is_empty());
        assert!(matches!(
            h.events.lock().last(),
            Some(ReservationEvent::ReservationStatusChanged {
                old_status: ReservationStatus::Active,
                new_status: ReservationStatus::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn test_status_update_edge_cases() {
        let h = harness();
        let device = low_device(&h.manager);
        let ada = requester(&h.manager, "Ada", Tier::Low);
        let reservation = h.manager.create_reservation(device.id(), ada.id()).unwrap();

        assert!(!h
            .manager
            .update_reservation_status(reservation.id(), ReservationStatus::Active)
            .unwrap());
        h.manager
            .update_reservation_status(reservation.id(), ReservationStatus::Completed)
            .unwrap();
        let events = h.events.lock().len();

        assert!(!h
            .manager
            .update_reservation_status(reservation.id(), ReservationStatus::Completed)
            .unwrap());
        let illegal = h
            .manager
            .update_reservation_status(reservation.id(), ReservationStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(illegal, crate::Error::InvalidTransition { .. }));
        let missing = h
            .manager
            .update_reservation_status(crate::ReservationId(404), ReservationStatus::Completed)
            .unwrap_err();
        assert!(missing.is_not_found());
        assert_eq!(h.events.lock().len(), events);
    }

    #[test]
    fn test_release_reassigns_to_queue_head() {
        let h = harness();
        let device = high_device(&h.manager);
        let r1 = requester(&h.manager, "R1", Tier::High);
        let r2 = requester(&h.manager, "R2", Tier::High);
        let first = h.manager.create_reservation(device.id(), r1.id()).unwrap();
        h.manager.add_to_queue(r2.id(), Tier::High).unwrap();
        h.events.lock().clear();

        h.manager
            .update_reservation_status(first.id(), ReservationStatus::Completed)
            .unwrap();

        assert_eq!(h.manager.queue_size(Tier::High), 0);
        let active = h.manager.active_reservations();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].requester_id(), r2.id());
        assert_eq!(active[0].device_id(), device.id());
        assert!(!h.manager.requester(r1.id()).unwrap().holds_device());

        let events = h.events.lock();
        assert!(matches!(
            events[0],
            ReservationEvent::ReservationStatusChanged { .. }
        ));
        assert_eq!(
            events[1],
            ReservationEvent::QueueSizeChanged {
                tier: Tier::High,
                old_size: 1,
                new_size: 0
            }
        );
        assert!(matches!(events[2], ReservationEvent::ReservationCreated { .. }));
    }

    #[test]
    fn test_assign_on_loaned_or_empty_is_noop() {
        let h = harness();
        let device = high_device(&h.manager);
        assert!(h.manager.assign_next_from_queue(device.id()).unwrap().is_none());

        let ada = requester(&h.manager, "Ada", Tier::High);
        h.manager.create_reservation(device.id(), ada.id()).unwrap();
        assert!(h.manager.assign_next_from_queue(device.id()).unwrap().is_none());
        assert!(h
            .manager
            .assign_next_from_queue(DeviceId(77))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_failed_assignment_restores_queue_head() {
        let h = harness();
        let device = high_device(&h.manager);
        let holder = requester(&h.manager, "Holder", Tier::High);
        let waiting = requester(&h.manager, "Waiting", Tier::High);
        let behind = requester(&h.manager, "Behind", Tier::High);
        let reservation = h.manager.create_reservation(device.id(), holder.id()).unwrap();
        h.manager.add_to_queue(waiting.id(), Tier::High).unwrap();
        h.manager.add_to_queue(behind.id(), Tier::High).unwrap();

        // Mark the waiting requester as holding behind the manager's back so the
        // follow-up reservation fails inside the transaction.
        h.manager
            .store()
            .with_connection(|db| {
                db.connection()
                    .execute(
                        "UPDATE requesters SET holds_device = 1 WHERE id = ?1",
                        [waiting.id().0],
                    )
                    .map_err(crate::Error::from)
            })
            .unwrap();
        h.events.lock().clear();

        h.manager
            .update_reservation_status(reservation.id(), ReservationStatus::Completed)
            .unwrap();

        let order: Vec<_> = h
            .manager
            .queue_snapshot(Tier::High)
            .iter()
            .map(|e| e.requester_id)
            .collect();
        assert_eq!(order, vec![waiting.id(), behind.id()]);
        assert!(h.manager.device(device.id()).unwrap().is_available());
        assert!(h
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, ReservationEvent::OperationError { .. })));
    }
}
