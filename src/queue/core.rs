//! # TaskQueue: bounded-concurrency FIFO of async work.
//!
//! [`TaskQueue`] limits how many enqueued async operations run at once.
//!
//! ## Architecture
//! ```text
//! enqueue(work) ──► WorkItem ──► [pending FIFO (Injector)] ──► spawn driver
//!                                                                  │
//!                         ┌────────────────────────────────────────┘
//!                         ▼
//!  driver loop (while !cancelled && !pending.is_empty()):
//!    ├─► semaphore.try_acquire()   (zero wait; exit on failure)
//!    ├─► drain: pop head ─► item.execute(token) ─► ... until empty/cancelled
//!    └─► drop permit, re-check
//! ```
//!
//! ## Rules
//! - Every successful `enqueue` spawns **one** driver; no driver ever waits for
//!   a permit, so no item is stranded once all earlier drivers have exited.
//! - At most `max_concurrent` drivers hold a permit; that is the bound on
//!   parallel execution regardless of how many drivers exist.
//! - A single driver processes items strictly in enqueue order.
//! - `dispose()` cancels the shared token, closes the semaphore and drops any
//!   still-queued items; their [`Completion`]s resolve as cancelled.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_deque::{Injector, Steal};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{QueueError, TaskError};

use super::config::QueueConfig;
use super::item::{Completion, QueueItem, WorkItem};

/// Shared queue state; drivers hold an `Arc` to it.
struct Inner {
    name: Arc<str>,
    max_concurrent: usize,
    pending: Injector<Box<dyn QueueItem>>,
    /// Items enqueued and not yet fully executed (or discarded).
    unfinished: Arc<AtomicUsize>,
    permits: Semaphore,
    token: CancellationToken,
}

/// Bounded-concurrency task queue.
///
/// Cheap to clone; clones share the same queue. The queue is disposed when
/// [`TaskQueue::dispose`] is called or the last clone is dropped.
///
/// # Example
/// ```rust
/// use taskgate::{TaskError, TaskQueue};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = TaskQueue::new(2);
///
/// let answer = queue.enqueue(|_token| async { Ok::<_, TaskError>(42) })?;
/// assert_eq!(answer.await?, 42);
///
/// queue.dispose();
/// assert!(queue.enqueue(|_token| async { Ok::<_, TaskError>(()) }).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
    _owner: Arc<DisposeOnDrop>,
}

/// Disposes the shared state once the last `TaskQueue` clone is gone.
///
/// Drivers only hold `Arc<Inner>`, so they never keep a dropped queue alive.
struct DisposeOnDrop(Arc<Inner>);

impl Drop for DisposeOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

impl TaskQueue {
    /// Creates a queue running at most `max_concurrent` items at once.
    ///
    /// `0` is clamped to `1`.
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_config(QueueConfig::new(max_concurrent))
    }

    /// Creates a queue from an explicit [`QueueConfig`].
    pub fn with_config(cfg: QueueConfig) -> Self {
        let max_concurrent = cfg.concurrency_limit();
        let inner = Arc::new(Inner {
            name: Arc::from(cfg.name.as_ref()),
            max_concurrent,
            pending: Injector::new(),
            unfinished: Arc::new(AtomicUsize::new(0)),
            permits: Semaphore::new(max_concurrent),
            token: CancellationToken::new(),
        });
        Self {
            _owner: Arc::new(DisposeOnDrop(Arc::clone(&inner))),
            inner,
        }
    }

    /// Enqueues one unit of async work.
    ///
    /// `work` receives the queue's shared [`CancellationToken`]; long-running
    /// work should watch it and return [`TaskError::Canceled`] once it fires.
    ///
    /// Returns a [`Completion`] that resolves when this specific item finishes.
    /// Must be called from within a Tokio runtime (a driver task is spawned).
    ///
    /// # Errors
    /// [`QueueError::Disposed`] if the queue was already disposed.
    pub fn enqueue<T, F, Fut>(&self, work: F) -> Result<Completion<T>, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let inner = &self.inner;
        if inner.token.is_cancelled() {
            return Err(QueueError::Disposed);
        }

        let (item, rx) = WorkItem::new(
            Box::new(move |token| work(token).boxed()),
            Arc::clone(&inner.unfinished),
        );
        inner.pending.push(Box::new(item));
        if inner.token.is_cancelled() {
            // Lost a race with dispose: the completion still resolves as
            // cancelled, but nothing may stay behind in the FIFO.
            inner.discard_pending();
        }
        tracing::trace!(queue = %inner.name, "work enqueued");

        let completion = Completion::new(rx, &inner.token);
        inner.trigger();
        Ok(completion)
    }

    /// Number of items enqueued and not yet fully executed.
    ///
    /// Advisory: may be stale by the time it is read.
    pub fn pending_count(&self) -> usize {
        self.inner.unfinished.load(Ordering::Acquire)
    }

    /// Number of items still waiting in the FIFO (not yet picked by a driver).
    pub fn queued_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of free executor slots.
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Executor limit this queue was created with (after clamping).
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Queue name from its [`QueueConfig`].
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True once [`TaskQueue::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Disposes the queue. Idempotent.
    ///
    /// - cancels the shared token: every outstanding [`Completion`] resolves
    ///   as [`TaskError::Canceled`] (running work observes it cooperatively);
    /// - closes the permit pool;
    /// - drops still-queued items without running them.
    ///
    /// After this, [`TaskQueue::enqueue`] always fails with [`QueueError::Disposed`].
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.inner.name)
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("pending", &self.pending_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    /// Spawns one fire-and-forget driver.
    fn trigger(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drive().await });
    }

    /// Drives until the FIFO is empty, the queue is disposed, or no permit is free.
    async fn drive(&self) {
        while !self.token.is_cancelled() && !self.pending.is_empty() {
            let Ok(permit) = self.permits.try_acquire() else {
                // All executors busy (or pool closed); a running driver will
                // pick the item up, or the next enqueue spawns a fresh attempt.
                break;
            };
            tracing::debug!(queue = %self.name, "driver acquired permit");
            self.drain().await;
            drop(permit);
        }
    }

    /// Executes head items one by one within this driver.
    async fn drain(&self) {
        while !self.token.is_cancelled() {
            let Some(item) = self.pop() else { break };
            item.execute(self.token.clone()).await;
        }
    }

    fn pop(&self) -> Option<Box<dyn QueueItem>> {
        loop {
            match self.pending.steal() {
                Steal::Success(item) => return Some(item),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    fn dispose(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.permits.close();

        let dropped = self.discard_pending();
        tracing::debug!(queue = %self.name, dropped, "task queue disposed");
    }

    /// Drops every queued item without running it; returns how many.
    fn discard_pending(&self) -> usize {
        let mut dropped = 0;
        while let Some(item) = self.pop() {
            drop(item);
            dropped += 1;
        }
        dropped
    }
}
