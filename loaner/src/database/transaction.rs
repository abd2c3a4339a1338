//! Transaction management and the multi-entity workflows of the loan store.
//!
//! Each workflow runs inside one IMMEDIATE transaction, so concurrent
//! writers serialize at the store. A conditional update that matches no row
//! means another caller committed first; the workflow then fails and the
//! transaction rolls back.

use std::sync::atomic::Ordering;
use std::time::SystemTime;

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior};

use crate::device::{Device, DeviceId, DeviceState, DeviceTrigger, NewDevice};
use crate::error::{Error, Result};
use crate::queue::QueueEntry;
use crate::requester::{NewRequester, Requester, RequesterId};
use crate::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::Tier;

use super::connection::Database;

/// Rows touched by a committed reservation.
#[derive(Debug, Clone)]
pub struct ReservationCommit {
    /// The new active reservation.
    pub reservation: Reservation,
    /// The device, now loaned.
    pub device: Device,
    /// The requester, now holding the device.
    pub requester: Requester,
    /// The queue entry the requester left, if they were waiting.
    pub dequeued: Option<QueueEntry>,
}

/// Outcome of a committed status update.
#[derive(Debug, Clone)]
pub enum StatusCommit {
    /// The stored status already matched; nothing was written.
    Unchanged(Reservation),
    /// The status was written.
    Changed {
        /// The reservation before the write.
        before: Reservation,
        /// The reservation after the write.
        after: Reservation,
        /// The released device, if the change freed one.
        device: Option<Device>,
        /// The released requester, if the change freed one.
        requester: Option<Requester>,
    },
}

/// Outcome of a queue insertion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueCommit {
    /// The entry was stored.
    Enqueued(QueueEntry),
    /// The requester already waits in some tier.
    AlreadyQueued(QueueEntry),
    /// The requester holds a device and may not queue.
    HoldsDevice,
    /// A device of the tier is free, so the caller should reserve it instead.
    DeviceAvailable(DeviceId),
}

impl Database {
    /// Runs `f` inside an IMMEDIATE transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. If `f`
    /// panics the transaction is rolled back when it is dropped, so the
    /// connection is always back in autocommit mode afterwards. A successful
    /// commit updates [`Database::last_commit`].
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a database error if the transaction
    /// cannot be started or committed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use loaner::database::{Database, DatabaseConfig};
    /// use loaner::{NewDevice, Tier};
    ///
    /// let mut db = Database::open(DatabaseConfig::new("/tmp/loaner.db")).unwrap();
    /// let device = db
    ///     .with_transaction(|tx| {
    ///         Database::insert_device_simple(tx, &NewDevice::new("HP", "EliteBook", 512, 16, Tier::High))
    ///     })
    ///     .unwrap();
    /// ```
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // IMMEDIATE holds the write lock, so stamps follow commit order
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                self.last_commit = stamp;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    log::warn!("rollback failed after '{e}': {rollback}");
                }
                Err(e)
            }
        }
    }

    /// Inserts a device in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a database error.
    pub fn register_device(&mut self, new_device: &NewDevice) -> Result<Device> {
        self.with_transaction(|tx| Self::insert_device_simple(tx, new_device))
    }

    /// Inserts a requester in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a database error.
    pub fn register_requester(&mut self, new_requester: &NewRequester) -> Result<Requester> {
        self.with_transaction(|tx| Self::insert_requester_simple(tx, new_requester))
    }

    /// Loans `device_id` to `requester_id`.
    ///
    /// Inserts the reservation, flips the device to loaned and the requester
    /// to holding, and drops any queue entry of the requester, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the device is no longer available or the
    /// requester already holds a device, or a database error.
    pub fn commit_reservation(
        &mut self,
        device_id: DeviceId,
        requester_id: RequesterId,
        at: SystemTime,
    ) -> Result<ReservationCommit> {
        let loaned = DeviceState::Available.apply(DeviceTrigger::Loan)?;
        self.with_transaction(|tx| {
            if !Self::set_device_state_simple(tx, device_id, DeviceState::Available, loaned)? {
                return Err(Error::validation(
                    "device",
                    format!("device {device_id} is not available"),
                ));
            }
            if !Self::set_holds_device_simple(tx, requester_id, true)? {
                return Err(Error::validation(
                    "requester",
                    format!("requester {requester_id} already holds a device"),
                ));
            }

            let reservation = Self::insert_reservation_simple(tx, device_id, requester_id, at)?;
            let dequeued = Self::take_queue_entry_simple(tx, requester_id)?;
            let device = Self::get_device(tx, device_id)?
                .ok_or_else(|| Error::not_found(format!("device {device_id}")))?;
            let requester = Self::get_requester(tx, requester_id)?
                .ok_or_else(|| Error::not_found(format!("requester {requester_id}")))?;

            Ok(ReservationCommit {
                reservation,
                device,
                requester,
                dequeued,
            })
        })
    }

    /// Moves reservation `id` to `to`.
    ///
    /// `seen` is the status the caller resolved before calling; it decides
    /// whether a terminal stored status is a lost race or an illegal request.
    /// A move into a terminal status also releases the device and requester.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the reservation does not exist
    /// - [`Error::ConcurrencyConflict`] if another caller finished it first
    /// - [`Error::InvalidTransition`] for a move out of a terminal status
    /// - a database error
    pub fn commit_status_change(
        &mut self,
        id: ReservationId,
        seen: ReservationStatus,
        to: ReservationStatus,
        at: SystemTime,
    ) -> Result<StatusCommit> {
        self.with_transaction(|tx| {
            let before = Self::get_reservation(tx, id)?
                .ok_or_else(|| Error::not_found(format!("reservation {id}")))?;
            let from = before.status();

            if from == to {
                return Ok(StatusCommit::Unchanged(before));
            }
            if from.is_terminal() && !seen.is_terminal() {
                return Err(Error::ConcurrencyConflict {
                    details: format!("reservation {id} was already {from}"),
                });
            }
            from.check_transition(to)?;

            if !Self::update_reservation_status_simple(tx, id, from, to, at)? {
                return Err(Error::ConcurrencyConflict {
                    details: format!("reservation {id} changed during update"),
                });
            }

            let (device, requester) = if to.is_terminal() {
                let device_id = before.device_id();
                let requester_id = before.requester_id();
                let returned = DeviceState::Loaned.apply(DeviceTrigger::Return)?;
                if !Self::set_device_state_simple(tx, device_id, DeviceState::Loaned, returned)? {
                    return Err(Error::ConcurrencyConflict {
                        details: format!("device {device_id} was not loaned"),
                    });
                }
                if !Self::set_holds_device_simple(tx, requester_id, false)? {
                    return Err(Error::ConcurrencyConflict {
                        details: format!("requester {requester_id} held no device"),
                    });
                }
                (
                    Self::get_device(tx, device_id)?,
                    Self::get_requester(tx, requester_id)?,
                )
            } else {
                (None, None)
            };

            let after = Self::get_reservation(tx, id)?
                .ok_or_else(|| Error::not_found(format!("reservation {id}")))?;

            Ok(StatusCommit::Changed {
                before,
                after,
                device,
                requester,
            })
        })
    }

    /// Queues `requester_id` in `tier` unless that would break an invariant.
    ///
    /// The holds-device flag, existing membership and free devices are all
    /// re-checked inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown requester, or a database
    /// error.
    pub fn enqueue_requester(
        &mut self,
        requester_id: RequesterId,
        tier: Tier,
        at: SystemTime,
    ) -> Result<EnqueueCommit> {
        self.with_transaction(|tx| {
            let requester = Self::get_requester(tx, requester_id)?
                .ok_or_else(|| Error::not_found(format!("requester {requester_id}")))?;
            if requester.holds_device() {
                return Ok(EnqueueCommit::HoldsDevice);
            }
            if let Some(existing) = Self::find_queue_entry(tx, requester_id)? {
                return Ok(EnqueueCommit::AlreadyQueued(existing));
            }
            let free = tx
                .query_row(
                    "SELECT id FROM devices WHERE tier = ?1 AND state = 'available' ORDER BY id LIMIT 1",
                    [tier.as_str()],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            if let Some(device_id) = free {
                return Ok(EnqueueCommit::DeviceAvailable(DeviceId(device_id)));
            }

            Self::insert_queue_entry_simple(tx, requester_id, tier, at)?
                .map(EnqueueCommit::Enqueued)
                .ok_or_else(|| Error::ConcurrencyConflict {
                    details: format!("requester {requester_id} was queued concurrently"),
                })
        })
    }

    /// Removes and returns the head of `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn pop_queue_front(&mut self, tier: Tier) -> Result<Option<QueueEntry>> {
        self.with_transaction(|tx| Self::pop_queue_front_simple(tx, tier))
    }

    /// Puts a popped entry back with its original position.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn restore_queue_entry(&mut self, entry: &QueueEntry) -> Result<bool> {
        self.with_transaction(|tx| Self::restore_queue_entry_simple(tx, entry))
    }

    /// Removes `requester_id` from `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn remove_queue_entry(&mut self, requester_id: RequesterId, tier: Tier) -> Result<bool> {
        self.with_transaction(|tx| Self::delete_queue_entry_simple(tx, requester_id, tier))
    }

    /// Empties `tier`, returning the removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn clear_queue(&mut self, tier: Tier) -> Result<Vec<QueueEntry>> {
        self.with_transaction(|tx| Self::clear_queue_simple(tx, tier))
    }
}
