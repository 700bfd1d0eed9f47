//! Bounded-concurrency task queue.
//!
//! ## Contents
//! - [`TaskQueue`] FIFO of async work limited to `N` concurrent executors
//! - [`Completion`] future for the outcome of one enqueued item
//! - [`QueueConfig`] construction settings
//!
//! Internally, each item is a `WorkItem<T>` stored behind the object-safe
//! `QueueItem` trait so items with different result types share one FIFO.

mod config;
mod core;
mod item;

pub use config::QueueConfig;
pub use self::core::TaskQueue;
pub use item::Completion;
