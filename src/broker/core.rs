//! # EventBroker: type-indexed publish/subscribe.
//!
//! [`EventBroker`] maps each declared event type to its [`SubscriberGroup`].
//! Groups are created lazily on the first `subscribe::<T>()` and live as long
//! as the broker.
//!
//! ## Dispatch
//! ```text
//! publish::<E>(ev)
//!   ├─► Lineage<E> = [E, supertypes of E ...]
//!   ├─► snapshot groups registered for any of those types
//!   ├─► group.dispatch(view(ev))   (handlers spawned immediately)
//!   └─► PublishResult(join of all group aggregates)
//! ```
//!
//! ## Rules
//! - Matching uses the **declared** type (the generic parameter), never the
//!   concrete type behind it.
//! - Subscribers of a supertype receive subtype events; subscribers of a
//!   subtype never receive supertype events.
//! - `publish` never blocks; groups registered after it started may be missed.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use taskgate::{Event, EventBroker};
//!
//! struct Ping(u32);
//! impl Event for Ping {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let broker = EventBroker::new();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let t = Arc::clone(&total);
//! let sub = broker.subscribe::<Ping>().with_sync_action(move |p| {
//!     t.fetch_add(p.0 as usize, Ordering::SeqCst);
//! });
//!
//! broker.publish(Ping(3)).handled().await;
//! sub.unsubscribe();
//! broker.publish(Ping(4)).await;
//!
//! assert_eq!(total.load(Ordering::SeqCst), 3);
//! # }
//! ```

use std::any::{TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::join_all;

use super::event::{Event, Lineage, Payload};
use super::group::{Dispatch, SubscriberGroup};
use super::publish::PublishResult;

/// In-process, type-indexed event broker.
///
/// Cheap to clone; clones share one registry. Ownership is up to the caller:
/// hold it wherever the scope of delivery should be.
#[derive(Clone, Default)]
pub struct EventBroker {
    groups: Arc<DashMap<TypeId, Arc<dyn Dispatch>>>,
}

impl EventBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subscriber group for the declared type `T`, creating it if absent.
    ///
    /// Idempotent: every call for the same `T` returns a handle to the same
    /// group. `T` may be unsized, e.g. `dyn Shape`.
    pub fn subscribe<T>(&self) -> SubscriberGroup<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entry = self
            .groups
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(SubscriberGroup::<T>::new()) as Arc<dyn Dispatch>);

        match entry.as_any().downcast_ref::<SubscriberGroup<T>>() {
            Some(group) => group.clone(),
            // Entries are only ever inserted under their own `TypeId`.
            None => unreachable!("group registered under a foreign TypeId"),
        }
    }

    /// Publishes `event` under its own type as the declared type.
    ///
    /// Must be called within a Tokio runtime when any handler matches.
    pub fn publish<E: Event>(&self, event: E) -> PublishResult {
        self.publish_shared(Arc::new(event))
    }

    /// Publishes an already shared event; `E` may be a trait object.
    ///
    /// Handlers of `E` and of every type in `E`'s [`Lineage`] are started
    /// before this returns.
    pub fn publish_shared<E: Event + ?Sized>(&self, event: Arc<E>) -> PublishResult {
        let lineage = Lineage::<E>::of();

        // Point-in-time view: resolve groups first so no shard lock is held
        // while upcasts run or handlers are spawned.
        let groups: Vec<_> = lineage
            .views()
            .filter_map(|(id, view)| {
                let group = self.groups.get(&id).map(|g| Arc::clone(g.value()))?;
                Some((group, view))
            })
            .collect();
        let targets: Vec<(Arc<dyn Dispatch>, Payload)> = groups
            .into_iter()
            .map(|(group, view)| (group, view(&event)))
            .collect();

        let matched_groups = targets.len();
        let mut handler_count = 0;
        let mut pending = Vec::with_capacity(matched_groups);
        for (group, payload) in targets {
            if let Some((started, done)) = group.dispatch(&*payload) {
                handler_count += started;
                pending.push(done);
            }
        }

        tracing::trace!(
            event = type_name::<E>(),
            declared_types = lineage.len(),
            matched_groups,
            handler_count,
            "event published"
        );
        PublishResult::new(join_all(pending).map(|_| ()).boxed(), matched_groups, handler_count)
    }

    /// Number of declared types with a subscriber group.
    pub fn subscribed_types(&self) -> usize {
        self.groups.len()
    }
}

impl std::fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroker")
            .field("subscribed_types", &self.groups.len())
            .finish()
    }
}
