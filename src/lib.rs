//! # taskgate
//!
//! **Taskgate** provides two in-process async coordination primitives for Tokio:
//!
//! - [`TaskQueue`]: a FIFO of async work that never runs more than `N` items at once;
//! - [`EventBroker`]: a type-indexed publish/subscribe broker whose subscribers
//!   of a supertype also receive events of its subtypes.
//!
//! ## Architecture
//! ### Task queue
//! ```text
//!  producer ── enqueue(work) ──► Result<Completion<T>, QueueError>
//!                 │
//!                 ├─► WorkItem<T> ──► [pending FIFO] ◄── pop head ──┐
//!                 └─► spawn driver ──► try_acquire permit ──────────┤
//!                                     (zero wait, N permits)        │
//!                                            │                      │
//!                                            └─► execute(token) ────┘
//!                                                  │
//!                             Completion<T> ◄──────┘ Ok / Fail / Panicked / Canceled
//!
//!  dispose() ─► cancel token ─► every outstanding Completion resolves Canceled
//! ```
//!
//! ### Event broker
//! ```text
//!  publish::<E>(ev)
//!     │
//!     ├─► Lineage<E>: [E, declared supertypes ...]
//!     ├─► SubscriberGroup<E>      ─► spawn handler 1..n ─┐
//!     ├─► SubscriberGroup<Super>  ─► spawn handler 1..m ─┼─► PublishResult::handled()
//!     └─► ...                                            ┘   (optional wait)
//!
//!  handler Err / panic ─► logged at debug, swallowed
//! ```
//!
//! ## Features
//! | Area          | Description                                                    | Key types / traits                         |
//! |---------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Queue**     | Bounded-concurrency FIFO of async work with cooperative cancel | [`TaskQueue`], [`Completion`]              |
//! | **Broker**    | Type-indexed pub/sub with declared supertypes                  | [`EventBroker`], [`Event`], [`Lineage`]    |
//! | **Handlers**  | Closures or trait objects, failure-isolated                    | [`SubscriberGroup`], [`Handle`]            |
//! | **Errors**    | Typed errors for the queue and for queued work                 | [`QueueError`], [`TaskError`]              |
//! | **Config**    | Queue construction settings                                    | [`QueueConfig`]                            |
//!
//! ## Logging
//! Diagnostics are emitted through [`tracing`]; install any subscriber to see them.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskgate::{Event, EventBroker, TaskError, TaskQueue};
//!
//! struct Resized { id: u32 }
//! impl Event for Resized {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = TaskQueue::new(2);
//!     let broker = EventBroker::new();
//!
//!     let _sub = broker.subscribe::<Resized>().with_action(|ev: Arc<Resized>| async move {
//!         println!("image {} resized", ev.id);
//!         Ok(())
//!     });
//!
//!     let id = queue
//!         .enqueue(|token| async move {
//!             if token.is_cancelled() {
//!                 return Err(TaskError::Canceled);
//!             }
//!             Ok(7)
//!         })?
//!         .await?;
//!
//!     broker.publish(Resized { id }).handled().await;
//!     queue.dispose();
//!     Ok(())
//! }
//! ```
mod broker;
mod error;
mod queue;

// ---- Public re-exports ----

pub use broker::{Event, EventBroker, Handle, Lineage, PublishResult, SubscriberGroup, Subscription};
pub use error::{QueueError, TaskError};
pub use queue::{Completion, QueueConfig, TaskQueue};

/// Re-export of the cancellation token handed to every work function.
pub use tokio_util::sync::CancellationToken;
