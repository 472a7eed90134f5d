//! Basic Supervision Tree - Start, Observe, Terminate
//!
//! Demonstrates the smallest useful supervision tree: a root supervisor with
//! a couple of workers under a `OneForOne` strategy, one of which fails once
//! and is restarted automatically.
//!
//! # Run This Example
//!
//! ```bash
//! cargo run --example basic_tree
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use suptree::{
    start, wait_for_cancellation, worker_spec, SupervisorSpecBuilder, WorkerBody, WorkerContext,
    WorkerFuture, WorkerOutcome,
};
use tokio_util::sync::CancellationToken;

/// A worker that fails exactly once on its first run, then behaves like a
/// normal long-lived worker. Lets this demo show an automatic restart
/// without looping forever.
fn flaky_worker() -> WorkerBody {
    let already_failed = Arc::new(AtomicBool::new(false));
    Arc::new(move |ctx: WorkerContext| -> WorkerFuture {
        let already_failed = already_failed.clone();
        Box::pin(async move {
            ctx.mark_ready();
            if !already_failed.swap(true, Ordering::SeqCst) {
                println!("[flaky] failing on purpose (first run)");
                return WorkerOutcome::Failed("simulated startup error".into());
            }
            println!("[flaky] running until cancelled");
            ctx.cancelled().cancelled().await;
            println!("[flaky] observed cancellation, shutting down");
            WorkerOutcome::Aborted
        })
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic Supervision Tree ===\n");

    let steady = worker_spec("steady", wait_for_cancellation())?;
    let flaky = worker_spec("flaky", flaky_worker())?;

    let spec = SupervisorSpecBuilder::new("root")
        .with_children([steady, flaky])
        .with_restart_intensity(3, Duration::from_secs(10))
        .build()?;

    println!("Starting tree...");
    let handle = start(spec, CancellationToken::new()).await?;
    println!("Tree started with children: {:?}", handle.get_children().iter().map(|c| c.name()).collect::<Vec<_>>());

    // Give the flaky worker time to fail and restart before shutting down.
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("\nTerminating tree...");
    match handle.terminate().await {
        None => println!("Tree terminated cleanly."),
        Some(err) => println!("Tree terminated with an error: {err}"),
    }

    Ok(())
}
