//! Error types used by the task queue and the work it runs.
//!
//! This module defines two error enums:
//!
//! - [`QueueError`]: errors raised by the [`TaskQueue`](crate::TaskQueue) itself.
//! - [`TaskError`]: the outcome of one unit of work that did not produce a value.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Event broker handlers have no error type here: their failures are swallowed
//! at the [`SubscriberGroup`](crate::SubscriberGroup) boundary.

use thiserror::Error;

/// # Errors produced by the task queue.
///
/// Returned synchronously from [`TaskQueue::enqueue`](crate::TaskQueue::enqueue),
/// never through the returned [`Completion`](crate::Completion).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was disposed; no further work is accepted.
    #[error("task queue disposed")]
    Disposed,
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::QueueError;
    ///
    /// assert_eq!(QueueError::Disposed.as_label(), "queue_disposed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Disposed => "queue_disposed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            QueueError::Disposed => "queue disposed; enqueue rejected".to_string(),
        }
    }
}

/// # Errors produced by a unit of queued work.
///
/// A work function returns `Result<T, TaskError>`; the same type is what the
/// caller observes when awaiting the [`Completion`](crate::Completion).
///
/// `From<anyhow::Error>` is implemented, so `?` on any `anyhow`-compatible
/// error inside a work closure yields [`TaskError::Fail`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Work was cancelled: the queue was disposed before it finished, or the
    /// work function itself observed cancellation.
    #[error("work cancelled")]
    Canceled,

    /// Work failed with an error raised by the work function.
    #[error("work failed: {0}")]
    Fail(anyhow::Error),

    /// The work function panicked.
    #[error("work panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text (if it was a string).
        message: String,
    },
}

impl TaskError {
    /// Wraps any error as a work failure.
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    ///
    /// let err = TaskError::fail(std::io::Error::other("disk full"));
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        TaskError::Fail(error.into())
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail(_) => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Canceled => "work cancelled".to_string(),
            TaskError::Fail(error) => format!("error: {error:#}"),
            TaskError::Panicked { message } => format!("panic: {message}"),
        }
    }

    /// True for [`TaskError::Canceled`].
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Returns the underlying failure, if this is [`TaskError::Fail`].
    ///
    /// Use it to downcast back to the concrete error the work function raised.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            TaskError::Fail(error) => Some(error),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(error: anyhow::Error) -> Self {
        TaskError::Fail(error)
    }
}

/// Renders a `catch_unwind` payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
