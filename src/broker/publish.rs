//! # Outcome of one publish call.

use std::future::IntoFuture;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Handle over the handlers started by one [`EventBroker::publish`](crate::EventBroker::publish).
///
/// Dispatch already started when this was created; awaiting it is optional.
/// Cloning is cheap and every clone observes the same aggregate, so any number
/// of waiters may call [`PublishResult::handled`].
///
/// `PublishResult` implements [`IntoFuture`], so `broker.publish(ev).await`
/// waits for all handlers.
#[derive(Clone)]
pub struct PublishResult {
    done: Shared<BoxFuture<'static, ()>>,
    matched_groups: usize,
    handler_count: usize,
}

impl PublishResult {
    pub(crate) fn new(done: BoxFuture<'static, ()>, matched_groups: usize, handler_count: usize) -> Self {
        Self {
            done: done.shared(),
            matched_groups,
            handler_count,
        }
    }

    /// Resolves once every matched handler finished (successfully or not).
    pub fn handled(&self) -> Shared<BoxFuture<'static, ()>> {
        self.done.clone()
    }

    /// Number of subscriber groups (declared types) the event matched.
    pub fn matched_groups(&self) -> usize {
        self.matched_groups
    }

    /// Number of handlers started for the event.
    pub fn handler_count(&self) -> usize {
        self.handler_count
    }
}

impl IntoFuture for PublishResult {
    type Output = ();
    type IntoFuture = Shared<BoxFuture<'static, ()>>;

    fn into_future(self) -> Self::IntoFuture {
        self.done
    }
}

impl std::fmt::Debug for PublishResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishResult")
            .field("matched_groups", &self.matched_groups)
            .field("handler_count", &self.handler_count)
            .finish()
    }
}
