//! Thread-safe per-tier waitlists.
//!
//! Each [`Queue`] keeps its entries ordered by `(enqueued_at, seq)` under a
//! single mutex, so every check-then-mutate sequence runs as one unit.
//! Size changes are reported to the [`EventBus`] with the old and new size
//! captured inside the critical section.

use std::collections::VecDeque;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::{EventBus, ReservationEvent};
use crate::{RequesterId, Tier};

#[cfg(all(test, feature = "property-tests"))]
mod proptests;

/// A requester waiting for a device of `tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Store-assigned arrival sequence, the tie-breaker for equal timestamps.
    pub seq: i64,
    /// The waiting requester.
    pub requester_id: RequesterId,
    /// The tier being waited for.
    pub tier: Tier,
    /// Arrival time.
    pub enqueued_at: SystemTime,
}

impl QueueEntry {
    fn sort_key(&self) -> (SystemTime, i64) {
        (self.enqueued_at, self.seq)
    }
}

/// FIFO waitlist for one tier.
///
/// # Examples
///
/// ```
/// use std::time::SystemTime;
/// use loaner::{EventBus, Queue, QueueEntry, RequesterId, Tier};
///
/// let queue = Queue::new(Tier::High, EventBus::new());
/// let entry = QueueEntry {
///     seq: 1,
///     requester_id: RequesterId(7),
///     tier: Tier::High,
///     enqueued_at: SystemTime::now(),
/// };
///
/// assert!(queue.enqueue(entry.clone()));
/// assert!(!queue.enqueue(entry));
/// assert_eq!(queue.size(), 1);
/// assert_eq!(queue.dequeue_front().unwrap().requester_id, RequesterId(7));
/// assert!(queue.dequeue_front().is_none());
/// ```
#[derive(Debug)]
pub struct Queue {
    tier: Tier,
    entries: Mutex<VecDeque<QueueEntry>>,
    events: EventBus,
}

impl Queue {
    /// Creates an empty queue for `tier`.
    #[must_use]
    pub fn new(tier: Tier, events: EventBus) -> Self {
        Self {
            tier,
            entries: Mutex::new(VecDeque::new()),
            events,
        }
    }

    /// Returns the tier served by this queue.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Inserts `entry` at its ordered position.
    ///
    /// A fresh entry lands at the tail. Returns `false` without changing
    /// anything if the requester is already queued here.
    pub fn enqueue(&self, entry: QueueEntry) -> bool {
        self.enqueue_deferred(entry).map(SizeChange::publish).is_some()
    }

    /// Puts a previously popped entry back at the head.
    ///
    /// Returns `false` if the requester is already queued again.
    pub fn restore_front(&self, entry: QueueEntry) -> bool {
        self.restore_front_deferred(entry)
            .map(SizeChange::publish)
            .is_some()
    }

    /// Removes and returns the head, if any.
    pub fn dequeue_front(&self) -> Option<QueueEntry> {
        let (entry, sizes) = {
            let mut entries = self.entries.lock();
            let old = entries.len();
            let entry = entries.pop_front()?;
            (entry, (old, entries.len()))
        };
        self.notify(sizes);
        Some(entry)
    }

    /// Removes the entry of `requester_id` wherever it sits.
    pub fn remove_by_id(&self, requester_id: RequesterId) -> bool {
        self.remove_deferred(requester_id)
            .map(SizeChange::publish)
            .is_some()
    }

    /// Empties the queue, returning what was removed in order.
    pub fn clear(&self) -> Vec<QueueEntry> {
        let (removed, change) = self.clear_deferred();
        if let Some(change) = change {
            change.publish();
        }
        removed
    }

    // The `*_deferred` variants mutate like their public counterparts but
    // hand the notification back, so the manager can publish it after
    // releasing its own locks.

    pub(crate) fn enqueue_deferred(&self, entry: QueueEntry) -> Option<SizeChange<'_>> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.requester_id == entry.requester_id) {
            return None;
        }
        let old = entries.len();
        let key = entry.sort_key();
        let at = entries.partition_point(|e| e.sort_key() <= key);
        entries.insert(at, entry);
        Some(self.change(old, entries.len()))
    }

    pub(crate) fn restore_front_deferred(&self, entry: QueueEntry) -> Option<SizeChange<'_>> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.requester_id == entry.requester_id) {
            return None;
        }
        let old = entries.len();
        entries.push_front(entry);
        Some(self.change(old, entries.len()))
    }

    pub(crate) fn remove_deferred(&self, requester_id: RequesterId) -> Option<SizeChange<'_>> {
        let mut entries = self.entries.lock();
        let at = entries.iter().position(|e| e.requester_id == requester_id)?;
        let old = entries.len();
        entries.remove(at);
        Some(self.change(old, entries.len()))
    }

    pub(crate) fn clear_deferred(&self) -> (Vec<QueueEntry>, Option<SizeChange<'_>>) {
        let mut entries = self.entries.lock();
        let old = entries.len();
        let removed: Vec<_> = entries.drain(..).collect();
        let change = (old > 0).then(|| self.change(old, 0));
        (removed, change)
    }

    /// Replaces the content without notifying, for hydration from the store.
    pub(crate) fn load(&self, mut snapshot: Vec<QueueEntry>) {
        snapshot.sort_by_key(QueueEntry::sort_key);
        *self.entries.lock() = snapshot.into();
    }

    /// Returns the number of waiting requesters.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nobody is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns `true` if `requester_id` is waiting here.
    #[must_use]
    pub fn contains(&self, requester_id: RequesterId) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.requester_id == requester_id)
    }

    /// Returns the 0-based position of `requester_id`.
    #[must_use]
    pub fn position(&self, requester_id: RequesterId) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .position(|e| e.requester_id == requester_id)
    }

    /// Returns the head without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<QueueEntry> {
        self.entries.lock().front().cloned()
    }

    /// Returns a copy of the entries in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    const fn change(&self, old_size: usize, new_size: usize) -> SizeChange<'_> {
        SizeChange {
            queue: self,
            old_size,
            new_size,
        }
    }

    fn notify(&self, (old_size, new_size): (usize, usize)) {
        self.events.publish(&ReservationEvent::QueueSizeChanged {
            tier: self.tier,
            old_size,
            new_size,
        });
    }
}

/// A queue size change captured under the queue lock and not yet published.
#[must_use = "a size change is lost unless published"]
#[derive(Debug)]
pub(crate) struct SizeChange<'a> {
    queue: &'a Queue,
    old_size: usize,
    new_size: usize,
}

impl SizeChange<'_> {
    /// Publishes the change as [`ReservationEvent::QueueSizeChanged`].
    pub(crate) fn publish(self) {
        self.queue.notify((self.old_size, self.new_size));
    }
}
