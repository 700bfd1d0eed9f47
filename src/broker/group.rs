//! # SubscriberGroup: handlers registered for one declared event type.
//!
//! A [`SubscriberGroup<T>`] is what [`EventBroker::subscribe`](crate::EventBroker::subscribe)
//! returns. Handlers are added with [`SubscriberGroup::with_action`] (async closure),
//! [`SubscriberGroup::with_sync_action`] (plain closure) or
//! [`SubscriberGroup::with_handler`] (a [`Handle`] implementation).
//!
//! ## Diagram
//! ```text
//!    handle_event(Arc<T>)
//!        │                   (Arc-clone per handler)
//!        ├──────────► spawn ─► handler 1 ─► Ok / Err / panic ─┐
//!        ├──────────► spawn ─► handler 2 ─► Ok / Err / panic ─┼─► aggregate resolves
//!        └──────────► spawn ─► handler N ─► Ok / Err / panic ─┘   when all finished
//! ```
//!
//! ## Rules
//! - Handlers start concurrently as soon as `handle_event` is called.
//! - A failing or panicking handler is isolated: its error is logged at
//!   `debug` and dropped; siblings and the aggregate are unaffected.
//! - No ordering across handlers.

use std::any::{Any, type_name};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::error::panic_message;

use super::subscription::Subscription;

/// Global sequence for subscription ids (unique per registration).
static SUBSCRIPTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Handler map shared between a group, its clones and its subscriptions.
pub(crate) type Handlers<T> = DashMap<u64, Arc<dyn Handle<T>>>;

/// # Event handler for a declared type `T`.
///
/// Implement it for stateful handlers; for one-off closures use
/// [`SubscriberGroup::with_action`].
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Returned errors and panics are swallowed by the group; report them
///   yourself if they matter.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use taskgate::Handle;
///
/// struct Audit;
///
/// #[async_trait]
/// impl Handle<String> for Audit {
///     async fn handle(&self, event: Arc<String>) -> anyhow::Result<()> {
///         anyhow::ensure!(!event.is_empty(), "empty audit record");
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str { "audit" }
/// }
/// ```
#[async_trait]
pub trait Handle<T: ?Sized + Send + Sync + 'static>: Send + Sync + 'static {
    /// Processes one event.
    async fn handle(&self, event: Arc<T>) -> anyhow::Result<()>;

    /// Name used in log events. Defaults to `type_name::<Self>()`.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Async closure handler.
struct ActionFn<F>(F);

#[async_trait]
impl<T, F, Fut> Handle<T> for ActionFn<F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Arc<T>) -> anyhow::Result<()> {
        (self.0)(event).await
    }

    fn name(&self) -> &'static str {
        "action"
    }
}

/// Synchronous closure handler.
struct SyncActionFn<F>(F);

#[async_trait]
impl<T, F> Handle<T> for SyncActionFn<F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    async fn handle(&self, event: Arc<T>) -> anyhow::Result<()> {
        (self.0)(&*event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sync_action"
    }
}

/// Handlers registered for the declared event type `T`.
///
/// Cheap to clone; clones (and every `subscribe::<T>()` call on the same
/// broker) share one handler map.
pub struct SubscriberGroup<T: ?Sized + Send + Sync + 'static> {
    handlers: Arc<Handlers<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Clone for SubscriberGroup<T> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> SubscriberGroup<T> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
        }
    }

    /// Registers an async closure; returns the handle that removes it.
    pub fn with_action<F, Fut>(&self, action: F) -> Subscription
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_handler(Arc::new(ActionFn(action)))
    }

    /// Registers a synchronous closure; returns the handle that removes it.
    pub fn with_sync_action<F>(&self, action: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.with_handler(Arc::new(SyncActionFn(action)))
    }

    /// Registers a [`Handle`] implementation; returns the handle that removes it.
    pub fn with_handler(&self, handler: Arc<dyn Handle<T>>) -> Subscription {
        let id = SUBSCRIPTION_SEQ.fetch_add(1, Ordering::Relaxed);
        self.handlers.insert(id, handler);
        tracing::trace!(event = type_name::<T>(), id, "handler subscribed");
        Subscription::new(id, type_name::<T>(), &self.handlers)
    }

    /// Runs every currently registered handler against `event`.
    ///
    /// Handlers are spawned before this returns; the future only reports when
    /// all of them finished. Must be called within a Tokio runtime.
    pub fn handle_event(&self, event: Arc<T>) -> BoxFuture<'static, ()> {
        self.start(event).1
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Spawns all handlers; returns how many were started and the aggregate.
    fn start(&self, event: Arc<T>) -> (usize, BoxFuture<'static, ()>) {
        // Snapshot first so no shard lock is held while spawning.
        let handlers: Vec<Arc<dyn Handle<T>>> = self
            .handlers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let started = handlers.len();

        let joins: Vec<_> = handlers
            .into_iter()
            .map(|handler| {
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    let name = handler.name();
                    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            tracing::debug!(handler = name, error = %err, "event handler failed");
                        }
                        Err(payload) => {
                            tracing::debug!(
                                handler = name,
                                panic = %panic_message(payload.as_ref()),
                                "event handler panicked"
                            );
                        }
                    }
                })
            })
            .collect();

        let aggregate = join_all(joins).map(|_| ()).boxed();
        (started, aggregate)
    }
}

impl<T: ?Sized + Send + Sync + 'static> std::fmt::Debug for SubscriberGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberGroup")
            .field("event", &type_name::<T>())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Type-erased group as stored in the broker registry.
pub(crate) trait Dispatch: Send + Sync + 'static {
    /// Starts handling if `payload` holds an `Arc<T>` for this group's `T`.
    fn dispatch(&self, payload: &(dyn Any + Send + Sync)) -> Option<(usize, BoxFuture<'static, ()>)>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: ?Sized + Send + Sync + 'static> Dispatch for SubscriberGroup<T> {
    fn dispatch(&self, payload: &(dyn Any + Send + Sync)) -> Option<(usize, BoxFuture<'static, ()>)> {
        payload
            .downcast_ref::<Arc<T>>()
            .map(|event| self.start(Arc::clone(event)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
