mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{Gated, QUIET, init_tracing, within};
use taskgate::{QueueConfig, QueueError, TaskError, TaskQueue};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_executes_and_returns_value() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut gate, work) = Gated::<bool>::new();

    let done = queue.enqueue(work).unwrap();
    gate.started().await;
    gate.release(Ok(true));

    assert!(within("completion", done).await.unwrap());
    assert_eq!(gate.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_executor_runs_items_in_order() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut first, first_work) = Gated::<u8>::new();
    let (mut second, second_work) = Gated::<u8>::new();

    let first_done = queue.enqueue(first_work).unwrap();
    let second_done = queue.enqueue(second_work).unwrap();

    first.started().await;
    tokio::time::sleep(QUIET).await;
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0, "second item must wait for the first");

    first.release(Ok(1));
    assert_eq!(within("first completion", first_done).await.unwrap(), 1);

    second.started().await;
    assert_eq!(second.calls(), 1);
    second.release(Ok(2));
    assert_eq!(within("second completion", second_done).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_executors_run_items_together() {
    init_tracing();
    let queue = TaskQueue::new(2);
    let (mut first, first_work) = Gated::<u8>::new();
    let (mut second, second_work) = Gated::<u8>::new();

    let first_done = queue.enqueue(first_work).unwrap();
    let second_done = queue.enqueue(second_work).unwrap();

    // Both must be running before either is released.
    first.started().await;
    second.started().await;

    first.release(Ok(1));
    second.release(Ok(2));
    assert_eq!(within("first completion", first_done).await.unwrap(), 1);
    assert_eq!(within("second completion", second_done).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_never_more_than_limit_running() {
    init_tracing();
    let queue = TaskQueue::new(2);
    let (mut a, a_work) = Gated::<()>::new();
    let (mut b, b_work) = Gated::<()>::new();
    let (mut c, c_work) = Gated::<()>::new();

    let a_done = queue.enqueue(a_work).unwrap();
    let b_done = queue.enqueue(b_work).unwrap();
    let c_done = queue.enqueue(c_work).unwrap();

    a.started().await;
    b.started().await;
    tokio::time::sleep(QUIET).await;
    assert_eq!(c.calls(), 0, "third item must not start while two run");
    assert_eq!(queue.queued_len(), 1);
    assert_eq!(queue.pending_count(), 3);

    a.release(Ok(()));
    within("a", a_done).await.unwrap();
    c.started().await;

    b.release(Ok(()));
    c.release(Ok(()));
    within("b", b_done).await.unwrap();
    within("c", c_done).await.unwrap();
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_while_running_cancels() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut gate, work) = Gated::<bool>::new();

    let done = queue.enqueue(work).unwrap();
    gate.started().await;

    queue.dispose();
    let err = within("cancelled completion", done).await.unwrap_err();
    assert!(err.is_canceled(), "expected cancellation, got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_work_finishing_after_dispose_resolves_cancelled() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();

    let done = queue
        .enqueue(move |_token| async move {
            let _ = started_tx.send(());
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TaskError>(1)
        })
        .unwrap();
    within("work start", started_rx).await.unwrap();

    queue.dispose();
    // Let the work run to completion before anyone awaits the result.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.pending_count(), 0);

    let err = within("late completion", done).await.unwrap_err();
    assert!(err.is_canceled(), "expected cancellation, got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_before_running_cancels_without_invoking() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut first, first_work) = Gated::<bool>::new();
    let (second, second_work) = Gated::<bool>::new();

    let first_done = queue.enqueue(first_work).unwrap();
    let second_done = queue.enqueue(second_work).unwrap();
    first.started().await;

    queue.dispose();

    assert!(within("second completion", second_done).await.unwrap_err().is_canceled());
    assert!(within("first completion", first_done).await.unwrap_err().is_canceled());
    tokio::time::sleep(QUIET).await;
    assert_eq!(second.calls(), 0, "never-started work must not be invoked");
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_after_dispose_fails() {
    init_tracing();
    let queue = TaskQueue::new(1);
    queue.dispose();

    let (gate, work) = Gated::<bool>::new();
    assert_eq!(queue.enqueue(work).unwrap_err(), QueueError::Disposed);
    assert_eq!(gate.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_work_failure_reaches_caller() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut gate, work) = Gated::<bool>::new();

    let done = queue.enqueue(work).unwrap();
    gate.started().await;
    gate.release(Err(TaskError::fail(anyhow::anyhow!("Test exception"))));

    let err = within("failed completion", done).await.unwrap_err();
    assert_eq!(err.as_label(), "task_failed");
    assert_eq!(err.failure().map(|e| e.to_string()).as_deref(), Some("Test exception"));
    assert_eq!(gate.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_work_signalling_cancel_resolves_cancelled() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let done = queue
        .enqueue(|_token| async { Err::<(), _>(TaskError::Canceled) })
        .unwrap();
    assert!(within("completion", done).await.unwrap_err().is_canceled());
    assert!(!queue.is_disposed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unit_work_completes() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut gate, work) = Gated::<()>::new();

    let done = queue.enqueue(work).unwrap();
    gate.release(Ok(()));
    within("completion", done).await.unwrap();
    assert_eq!(gate.calls(), 1);
}

async fn explode() -> Result<(), TaskError> {
    panic!("worker exploded")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_work_is_reported_and_queue_keeps_going() {
    init_tracing();
    let queue = TaskQueue::new(1);

    let boom = queue
        .enqueue(|_token| explode())
        .unwrap();
    let next = queue.enqueue(|_token| async { Ok::<_, TaskError>("still alive") }).unwrap();

    match within("panicked completion", boom).await {
        Err(TaskError::Panicked { message }) => assert_eq!(message, "worker exploded"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(within("next completion", next).await.unwrap(), "still alive");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_producers_respect_limit() {
    init_tracing();
    let mut cfg = QueueConfig::new(3);
    cfg.name = "stress".into();
    let queue = TaskQueue::with_config(cfg);
    assert_eq!(queue.name(), "stress");

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut producers = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        let (running, peak, finished) = (Arc::clone(&running), Arc::clone(&peak), Arc::clone(&finished));
        producers.push(tokio::spawn(async move {
            let mut completions = Vec::new();
            for _ in 0..25 {
                let (running, peak, finished) =
                    (Arc::clone(&running), Arc::clone(&peak), Arc::clone(&finished));
                completions.push(
                    queue
                        .enqueue(move |_token| async move {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(1)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            finished.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, TaskError>(())
                        })
                        .unwrap(),
                );
            }
            for c in completions {
                c.await.unwrap();
            }
        }));
    }
    for p in producers {
        within("producer", p).await.unwrap();
    }

    assert_eq!(finished.load(Ordering::SeqCst), 200);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak} exceeds limit");
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropping_queue_cancels_outstanding_work() {
    init_tracing();
    let queue = TaskQueue::new(1);
    let (mut gate, work) = Gated::<u8>::new();
    let (_waiting, waiting_work) = Gated::<u8>::new();

    let running = queue.enqueue(work).unwrap();
    let queued = queue.enqueue(waiting_work).unwrap();
    gate.started().await;

    drop(queue);
    assert!(within("running completion", running).await.unwrap_err().is_canceled());
    assert!(within("queued completion", queued).await.unwrap_err().is_canceled());
}
