//! # Queued work items and their completion futures.
//!
//! A [`WorkItem`] bundles one unit of work with the sending half of a
//! `oneshot` channel. The receiving half is wrapped in a [`Completion`], which
//! is what [`TaskQueue::enqueue`](crate::TaskQueue::enqueue) hands back.
//!
//! ```text
//! enqueue(work) ──► WorkItem { work, done: oneshot::Sender } ──► [pending FIFO]
//!       │                                                            │
//!       └──► Completion { rx, cancelled } ◄── send(result) ◄── execute(token)
//!                     ▲
//!                     └── token.cancel() (dispose) resolves it as Canceled
//! ```
//!
//! ## Rules
//! - The result is delivered **at most once** (`oneshot::Sender::send` consumes the sender).
//! - A panic inside the work function is caught and reported as [`TaskError::Panicked`].
//! - A [`Completion`] resolves as [`TaskError::Canceled`] once the queue token
//!   fires, whether or not the item ever started.
//! - Work that finishes after the token fired delivers [`TaskError::Canceled`],
//!   never its own outcome, however late the caller awaits.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::{TaskError, panic_message};

/// Boxed work function: receives the queue token, produces the work future.
pub(crate) type BoxWork<T> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, TaskError>> + Send>;

/// Type-erased queue entry.
///
/// Lets items with different result types share one pending FIFO.
#[async_trait]
pub(crate) trait QueueItem: Send + 'static {
    /// Runs the work to completion and delivers its outcome.
    async fn execute(self: Box<Self>, token: CancellationToken);
}

/// Decrements the queue's pending counter when the item is dropped,
/// whether it was executed or discarded on dispose.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One unit of queued work with its completion channel.
pub(crate) struct WorkItem<T> {
    work: BoxWork<T>,
    done: oneshot::Sender<Result<T, TaskError>>,
    _pending: PendingGuard,
}

impl<T: Send + 'static> WorkItem<T> {
    /// Creates the item and the receiver its result will be sent to.
    pub(crate) fn new(
        work: BoxWork<T>,
        pending: Arc<AtomicUsize>,
    ) -> (Self, oneshot::Receiver<Result<T, TaskError>>) {
        let (done, rx) = oneshot::channel();
        let item = Self {
            work,
            done,
            _pending: PendingGuard::new(pending),
        };
        (item, rx)
    }
}

#[async_trait]
impl<T: Send + 'static> QueueItem for WorkItem<T> {
    async fn execute(self: Box<Self>, token: CancellationToken) {
        let WorkItem { work, done, _pending: pending } = *self;
        let work_token = token.clone();

        // The call itself happens inside the polled future so a panic while
        // building the work future is caught too.
        let outcome = match AssertUnwindSafe(async move { work(work_token).await })
            .catch_unwind()
            .await
        {
            // Dispose fired before the work finished: the outcome is discarded.
            _ if token.is_cancelled() => Err(TaskError::Canceled),
            Ok(res) => res,
            Err(payload) => Err(TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        };

        // Counted as finished before the caller can observe the outcome.
        drop(pending);
        // Receiver may already be gone (caller dropped the Completion).
        let _ = done.send(outcome);
    }
}

/// Future resolving to the outcome of one enqueued unit of work.
///
/// Returned by [`TaskQueue::enqueue`](crate::TaskQueue::enqueue). Resolves to:
/// - `Ok(value)` when the work function succeeded;
/// - `Err(TaskError::Fail(_))` / `Err(TaskError::Panicked { .. })` when it failed;
/// - `Err(TaskError::Canceled)` when it signalled cancellation, or the queue was
///   disposed before the work finished (including work that never started).
///
/// The work runs whether or not this future is polled; dropping it only
/// discards the result.
#[must_use = "dropping a Completion discards the work's result"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, TaskError>>, token: &CancellationToken) -> Self {
        Self {
            rx,
            cancelled: Box::pin(token.clone().cancelled_owned()),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // A delivered result wins over a cancellation that fired afterwards.
        if let Poll::Ready(res) = Pin::new(&mut this.rx).poll(cx) {
            // Sender dropped without a result: the item was discarded unexecuted.
            return Poll::Ready(res.unwrap_or(Err(TaskError::Canceled)));
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(TaskError::Canceled));
        }
        Poll::Pending
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
