//! Logging Notifier - Structured Event Logging via `tracing`
//!
//! Demonstrates wiring a closure-based [`FnNotifier`] as the event sink for a
//! tree, emitting a structured `tracing` record for every lifecycle
//! transition instead of discarding events. Mirrors the closure-based
//! notifier idiom of the system this crate's event model is grounded on,
//! adapted to `tracing` spans/fields instead of a JSON logger.
//!
//! # Run This Example
//!
//! ```bash
//! RUST_LOG=debug cargo run --example logging_notifier
//! ```

use std::sync::Arc;
use std::time::Duration;

use suptree::{start, wait_for_cancellation, worker_spec, Event, EventNotifier, FnNotifier, SupervisorSpecBuilder};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn log_every_event(event: &Event) {
    match &event.error {
        Some(err) => {
            tracing::debug!(path = %event.node_path, tag = %event.tag, error = %err, "supervision event");
        }
        None => {
            tracing::debug!(path = %event.node_path, tag = %event.tag, "supervision event");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let notifier: Arc<dyn EventNotifier> = Arc::new(FnNotifier::new(log_every_event));

    let worker = worker_spec("pinger", wait_for_cancellation())?;
    let spec = SupervisorSpecBuilder::new("root").with_children([worker]).with_notifier(notifier).build()?;

    let handle = start(spec, CancellationToken::new()).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.terminate().await;

    Ok(())
}
