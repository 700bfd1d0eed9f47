//! # Example: bounded queue
//!
//! Enqueues ten jobs on a queue that runs at most three at a time, then
//! disposes it while a slow job is still running.
//!
//! ```bash
//! RUST_LOG=taskgate=debug cargo run --example bounded_queue
//! ```

use std::time::Duration;

use taskgate::{QueueConfig, TaskError, TaskQueue};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut cfg = QueueConfig::default();
    cfg.name = "demo".into();
    cfg.max_concurrent = 3;
    let queue = TaskQueue::with_config(cfg);

    let mut jobs = Vec::new();
    for n in 0..10u64 {
        jobs.push(queue.enqueue(move |token| async move {
            tokio::select! {
                _ = token.cancelled() => Err(TaskError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(50 * (n % 3 + 1))) => Ok(n * n),
            }
        })?);
    }
    println!("enqueued: pending={}", queue.pending_count());

    for (n, job) in jobs.into_iter().enumerate() {
        println!("job {n} -> {:?}", job.await?);
    }

    let slow = queue.enqueue(|token| async move {
        token.cancelled().await;
        Err::<(), _>(TaskError::Canceled)
    })?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.dispose();

    match slow.await {
        Err(e) => println!("slow job: {}", e.as_label()),
        Ok(()) => println!("slow job finished"),
    }
    if let Err(e) = queue.enqueue(|_| async { Ok::<_, TaskError>(()) }) {
        println!("after dispose: {e}");
    }
    Ok(())
}
