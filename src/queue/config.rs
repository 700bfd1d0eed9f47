//! # Configuration for a [`TaskQueue`](crate::TaskQueue).
//!
//! [`QueueConfig`] centralizes the settings a queue is built with:
//! - `name`: label recorded on every log event the queue emits
//! - `max_concurrent`: size of the permit pool (executor limit)
//!
//! ## Example
//! ```rust
//! use taskgate::{QueueConfig, TaskQueue};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut cfg = QueueConfig::default();
//! cfg.name = "thumbnails".into();
//! cfg.max_concurrent = 4;
//!
//! let queue = TaskQueue::with_config(cfg);
//! assert_eq!(queue.max_concurrent(), 4);
//! # }
//! ```

use std::borrow::Cow;
use std::num::NonZeroUsize;

/// Settings for a bounded-concurrency task queue.
///
/// ## Field semantics
/// - `name`: free-form label used in logs (default `"taskgate"`)
/// - `max_concurrent`: maximum number of work functions running at once
///   (`0` is clamped to `1`; see [`QueueConfig::concurrency_limit`])
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Queue name recorded on log events.
    pub name: Cow<'static, str>,

    /// Maximum number of concurrently executing work items.
    ///
    /// Fixed for the lifetime of the queue.
    pub max_concurrent: usize,
}

impl QueueConfig {
    /// Creates a config with the given executor limit and the default name.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Self::default()
        }
    }

    /// Returns the executor limit clamped to a minimum of 1.
    ///
    /// A queue with zero permits could never run anything.
    #[inline]
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

impl Default for QueueConfig {
    /// Default configuration:
    ///
    /// - `name = "taskgate"`
    /// - `max_concurrent = available parallelism` (1 if unknown)
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("taskgate"),
            max_concurrent: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}
