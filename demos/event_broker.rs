//! # Example: event broker
//!
//! Shows declared supertypes: a `dyn Shape` subscriber sees every shape,
//! a `Circle` subscriber sees only circles.
//!
//! ```bash
//! RUST_LOG=taskgate=debug cargo run --example event_broker
//! ```

use std::sync::Arc;

use taskgate::{Event, EventBroker, Lineage};
use tracing_subscriber::EnvFilter;

trait Shape: Send + Sync {
    fn name(&self) -> &'static str;
    fn area(&self) -> f64;
}
impl Event for dyn Shape {}

struct Circle {
    r: f64,
}

impl Shape for Circle {
    fn name(&self) -> &'static str {
        "circle"
    }
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.r * self.r
    }
}

impl Event for Circle {
    fn lineage(l: &mut Lineage<Self>) {
        l.extends(|c: Arc<Circle>| -> Arc<dyn Shape> { c });
    }
}

struct Square {
    side: f64,
}

impl Shape for Square {
    fn name(&self) -> &'static str {
        "square"
    }
    fn area(&self) -> f64 {
        self.side * self.side
    }
}

impl Event for Square {
    fn lineage(l: &mut Lineage<Self>) {
        l.extends(|s: Arc<Square>| -> Arc<dyn Shape> { s });
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let broker = EventBroker::new();

    let _all = broker.subscribe::<dyn Shape>().with_sync_action(|s| {
        println!("[shape]  {} area={:.2}", s.name(), s.area());
    });
    let circles = broker.subscribe::<Circle>().with_action(|c: Arc<Circle>| async move {
        println!("[circle] r={}", c.r);
        Ok(())
    });
    let _flaky = broker.subscribe::<Square>().with_action(|_s: Arc<Square>| async move {
        anyhow::bail!("squares are not supported here")
    });

    broker.publish(Circle { r: 1.0 }).await;
    broker.publish(Square { side: 2.0 }).await;

    circles.unsubscribe();
    let res = broker.publish(Circle { r: 3.0 });
    println!("matched_groups={} handlers={}", res.matched_groups(), res.handler_count());
    res.await;
}
