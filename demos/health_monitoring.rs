//! Health Monitoring - Passive Liveness Reporting Alongside Supervision
//!
//! Demonstrates installing a [`HealthMonitor`] as one member of a
//! [`CompositeNotifier`], so it observes every lifecycle event a tree emits
//! without participating in restart decisions, and polling its
//! [`HealthReport`] periodically the way an external readiness probe would.
//!
//! # Run This Example
//!
//! ```bash
//! cargo run --example health_monitoring
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use suptree::{
    start, worker_spec, CompositeNotifier, EventNotifier, HealthMonitor, SupervisorSpecBuilder,
    WorkerBody, WorkerContext, WorkerFuture, WorkerOutcome,
};
use tokio_util::sync::CancellationToken;

/// Fails every third run, so the health monitor has something to report on a
/// timeline a reader can follow.
fn occasionally_failing_worker() -> WorkerBody {
    let runs = Arc::new(AtomicU32::new(0));
    Arc::new(move |ctx: WorkerContext| -> WorkerFuture {
        let runs = runs.clone();
        Box::pin(async move {
            ctx.mark_ready();
            let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
            if run % 3 == 0 {
                return WorkerOutcome::Failed(format!("run {run} failed").into());
            }
            tokio::select! {
                _ = ctx.cancelled().cancelled() => WorkerOutcome::Aborted,
                _ = tokio::time::sleep(Duration::from_millis(60)) => WorkerOutcome::Failed("timed out".into()),
            }
        })
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let monitor = Arc::new(HealthMonitor::new(2, Duration::from_secs(5)));
    let notifier: Arc<dyn EventNotifier> =
        Arc::new(CompositeNotifier::new(vec![monitor.clone() as Arc<dyn EventNotifier>]));

    let worker = worker_spec("intermittent", occasionally_failing_worker())?;
    let spec = SupervisorSpecBuilder::new("root")
        .with_children([worker])
        .with_restart_intensity(20, Duration::from_secs(5))
        .with_notifier(notifier)
        .build()?;

    let handle = start(spec, CancellationToken::new()).await?;

    for tick in 0..10 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = monitor.health_report();
        println!(
            "tick {tick}: healthy={} failed={:?} delayed_restart={:?}",
            report.is_healthy(),
            report.failed_processes(),
            report.delayed_restart_processes()
        );
    }

    handle.terminate().await;
    Ok(())
}
