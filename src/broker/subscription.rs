//! # Subscription handles.
//!
//! A [`Subscription`] is returned for every registered handler. Calling
//! [`Subscription::unsubscribe`] removes exactly that handler from exactly
//! the group it was registered on.
//!
//! Dropping a `Subscription` does **not** unsubscribe: the handler stays
//! registered for the lifetime of the broker unless explicitly removed.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use super::group::{Handle, Handlers};

/// Removal side of a handler map, independent of its event type.
trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
    fn holds(&self, id: u64) -> bool;
}

impl<T: ?Sized + Send + Sync + 'static> Detach for DashMap<u64, Arc<dyn Handle<T>>> {
    fn detach(&self, id: u64) -> bool {
        self.remove(&id).is_some()
    }

    fn holds(&self, id: u64) -> bool {
        self.contains_key(&id)
    }
}

/// Handle for one registered handler.
///
/// Holds only a weak reference to the group's handler map.
pub struct Subscription {
    id: u64,
    event: &'static str,
    handlers: Weak<dyn Detach>,
}

impl Subscription {
    pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(
        id: u64,
        event: &'static str,
        handlers: &Arc<Handlers<T>>,
    ) -> Self {
        let handlers = Arc::downgrade(handlers) as Weak<dyn Detach>;
        Self { id, event, handlers }
    }

    /// Removes the handler. Idempotent.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        let removed = self
            .handlers
            .upgrade()
            .is_some_and(|handlers| handlers.detach(self.id));
        if removed {
            tracing::trace!(event = self.event, id = self.id, "handler unsubscribed");
        }
        removed
    }

    /// True while the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.handlers
            .upgrade()
            .is_some_and(|handlers| handlers.holds(self.id))
    }

    /// Unique id of this registration.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Declared event type the handler was registered for.
    pub fn event_type(&self) -> &'static str {
        self.event
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("active", &self.is_active())
            .finish()
    }
}
