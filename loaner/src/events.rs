//! Typed events emitted by the reservation engine.
//!
//! [`EventBus`] keeps an ordered registry of listeners. Delivery is
//! synchronous on the publishing thread, in registration order. A listener
//! that returns an error or panics is logged and skipped; the remaining
//! listeners still receive the event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::{Reservation, ReservationStatus, Tier};

/// An event published after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReservationEvent {
    /// A reservation was created and its device loaned.
    ReservationCreated {
        /// The new reservation.
        reservation: Reservation,
    },
    /// A reservation changed status.
    ReservationStatusChanged {
        /// The reservation after the change.
        reservation: Reservation,
        /// Status before the change.
        old_status: ReservationStatus,
        /// Status after the change.
        new_status: ReservationStatus,
    },
    /// A tier queue grew or shrank.
    QueueSizeChanged {
        /// Which queue.
        tier: Tier,
        /// Size before the mutation.
        old_size: usize,
        /// Size after the mutation.
        new_size: usize,
    },
    /// A workflow failed after validation.
    OperationError {
        /// What was being attempted.
        message: String,
        /// The underlying error, rendered.
        cause: String,
    },
}

/// Consumer of [`ReservationEvent`]s.
///
/// Implemented for any `Fn(&ReservationEvent) -> anyhow::Result<()>` closure.
/// Handlers run on the publishing thread and must not block for long.
pub trait EventListener: Send + Sync {
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// An error is logged by the bus and does not reach other listeners.
    fn on_event(&self, event: &ReservationEvent) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&ReservationEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &ReservationEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn EventListener>)>,
}

/// Ordered, failure-isolating fan-out of [`ReservationEvent`]s.
///
/// Cloning the bus yields another handle to the same registry.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use loaner::{EventBus, ReservationEvent, Tier};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// bus.subscribe(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// bus.publish(&ReservationEvent::QueueSizeChanged { tier: Tier::High, old_size: 0, new_size: 1 });
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure listener after all existing ones.
    pub fn subscribe<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&ReservationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_listener(Arc::new(handler))
    }

    /// Registers a listener object after all existing ones.
    pub fn subscribe_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let mut registry = self.registry.write();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write();
        let before = registry.listeners.len();
        registry.listeners.retain(|(listener_id, _)| *listener_id != id);
        registry.listeners.len() != before
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.read().listeners.len()
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// Returns the number of listeners that handled it without error.
    pub fn publish(&self, event: &ReservationEvent) -> usize {
        // Listeners run without the registry lock so they may subscribe.
        let listeners: Vec<_> = self
            .registry
            .read()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::warn!("event listener {id:?} failed: {e:#}"),
                Err(_) => log::error!("event listener {id:?} panicked"),
            }
        }
        delivered
    }

    /// Publishes an [`ReservationEvent::OperationError`].
    pub(crate) fn publish_error(&self, message: impl Into<String>, cause: &crate::Error) {
        self.publish(&ReservationEvent::OperationError {
            message: message.into(),
            cause: cause.to_string(),
        });
    }
}
