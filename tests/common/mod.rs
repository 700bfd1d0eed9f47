//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use taskgate::{CancellationToken, TaskError};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// How long a test watches for something that must *not* happen.
pub const QUIET: Duration = Duration::from_millis(100);

/// Installs a test-friendly `tracing` subscriber once (`RUST_LOG` controls it).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Awaits `fut`, failing the test if it takes longer than [`WAIT`].
pub async fn within<F: IntoFuture>(what: &str, fut: F) -> F::Output {
    match tokio::time::timeout(WAIT, fut.into_future()).await {
        Ok(out) => out,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

/// Work function that blocks until the test releases it.
///
/// It counts its invocations, reports when it started and resolves as
/// cancelled as soon as the queue token fires.
pub struct Gated<T> {
    calls: Arc<AtomicUsize>,
    started: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<Result<T, TaskError>>>,
}

pub type GatedWork<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, TaskError>> + Send>;

impl<T: Send + 'static> Gated<T> {
    pub fn new() -> (Self, GatedWork<T>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<Result<T, TaskError>>();

        let counter = Arc::clone(&calls);
        let work: GatedWork<T> = Box::new(move |token: CancellationToken| {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = started_tx.send(());
                tokio::select! {
                    _ = token.cancelled() => Err(TaskError::Canceled),
                    res = release_rx => res.unwrap_or(Err(TaskError::Canceled)),
                }
            }
            .boxed()
        });

        let gate = Self {
            calls,
            started: Some(started_rx),
            release: Some(release_tx),
        };
        (gate, work)
    }

    /// Waits until the work function has been invoked.
    pub async fn started(&mut self) {
        let rx = self.started.take().expect("started() awaited twice");
        within("work to start", rx)
            .await
            .expect("work dropped before starting");
    }

    /// Lets the work function finish with `outcome`.
    pub fn release(&mut self, outcome: Result<T, TaskError>) {
        let tx = self.release.take().expect("released twice");
        let _ = tx.send(outcome);
    }

    /// How many times the work function was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
