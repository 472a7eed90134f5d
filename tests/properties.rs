//! Integration-level checks of the restart-strategy and restart-intensity
//! invariants against a real running tree. `affected_children` itself (which
//! siblings a strategy picks) is already exhaustively unit-tested next to its
//! definition; these tests exercise the behavior those siblings actually
//! observe end to end.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use suptree::{
    start, wait_for_cancellation, worker_spec, ChannelNotifier, Event, EventNotifier, EventTag,
    NodeSpecExt, RestartPolicy, Strategy, SupervisorError, SupervisorSpecBuilder, WorkerBody,
    WorkerContext, WorkerFuture, WorkerOutcome,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

fn fails_exactly_once(flag: Arc<AtomicBool>) -> WorkerBody {
    Arc::new(move |ctx: WorkerContext| -> WorkerFuture {
        let flag = flag.clone();
        Box::pin(async move {
            ctx.mark_ready();
            if !flag.swap(true, Ordering::SeqCst) {
                return WorkerOutcome::Failed("first failure".into());
            }
            ctx.cancelled().cancelled().await;
            WorkerOutcome::Aborted
        })
    })
}

fn always_fails() -> WorkerBody {
    Arc::new(|ctx: WorkerContext| -> WorkerFuture {
        Box::pin(async move {
            ctx.mark_ready();
            WorkerOutcome::Failed("boom".into())
        })
    })
}

/// Starts cleanly once, then on its first restart fails before ever calling
/// `mark_ready` — a restart-start failure, as opposed to a failure of an
/// already-running worker.
fn fails_to_restart_after_one_run() -> WorkerBody {
    let attempt = Arc::new(AtomicU32::new(0));
    Arc::new(move |ctx: WorkerContext| -> WorkerFuture {
        let attempt = attempt.clone();
        Box::pin(async move {
            if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                ctx.mark_ready();
                return WorkerOutcome::Failed("first run failure".into());
            }
            WorkerOutcome::Failed("retry failed to start".into())
        })
    })
}

fn spawn_collector(mut rx: UnboundedReceiver<Event>) -> (Arc<Mutex<Vec<Event>>>, tokio::task::JoinHandle<()>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let collector = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.lock().unwrap().push(event);
        }
    });
    (events, collector)
}

async fn wait_for_event_count(events: &Mutex<Vec<Event>>, n: usize) {
    for _ in 0..400 {
        if events.lock().unwrap().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {n} events, saw {}", events.lock().unwrap().len());
}

#[tokio::test]
async fn one_for_all_restarts_every_sibling_when_one_fails() {
    let (channel, rx) = ChannelNotifier::new();
    let notifier: Arc<dyn EventNotifier> = Arc::new(channel);
    let (events, collector) = spawn_collector(rx);

    let flag = Arc::new(AtomicBool::new(false));
    let a = worker_spec("a", wait_for_cancellation()).unwrap();
    let b = worker_spec("b", fails_exactly_once(flag)).unwrap();
    let c = worker_spec("c", wait_for_cancellation()).unwrap();
    let spec = SupervisorSpecBuilder::new("root")
        .with_children([a, b, c])
        .with_strategy(Strategy::OneForAll)
        .with_restart_intensity(5, Duration::from_secs(60))
        .with_notifier(notifier.clone())
        .build()
        .unwrap();

    let handle = start(spec, CancellationToken::new()).await.unwrap();
    // 4 initial starts (a, b, c, root) + failure + 2 terminations + 3 restarts.
    wait_for_event_count(&events, 10).await;
    assert!(handle.terminate().await.is_none());
    drop(handle);
    drop(notifier);
    collector.await.unwrap();

    let tags: Vec<_> = events.lock().unwrap().iter().map(|e| (e.tag, e.node_path.clone())).collect();
    let failed_at = tags.iter().position(|t| t == &(EventTag::WorkerFailed, "root/b".into())).unwrap();
    let after = &tags[failed_at + 1..];

    let other_terms: Vec<_> = after
        .iter()
        .take(2)
        .filter(|(t, _)| *t == EventTag::WorkerTerminated)
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(other_terms, vec!["root/c".to_string(), "root/a".to_string()]);

    let restarts: Vec<_> = after
        .iter()
        .skip(2)
        .take(3)
        .filter(|(t, _)| *t == EventTag::WorkerStarted)
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(restarts, vec!["root/a".to_string(), "root/b".to_string(), "root/c".to_string()]);
}

#[tokio::test]
async fn rest_for_one_restarts_only_the_failed_child_and_its_successors() {
    let (channel, rx) = ChannelNotifier::new();
    let notifier: Arc<dyn EventNotifier> = Arc::new(channel);
    let (events, collector) = spawn_collector(rx);

    let flag = Arc::new(AtomicBool::new(false));
    let a = worker_spec("a", wait_for_cancellation()).unwrap();
    let b = worker_spec("b", fails_exactly_once(flag)).unwrap();
    let c = worker_spec("c", wait_for_cancellation()).unwrap();
    let spec = SupervisorSpecBuilder::new("root")
        .with_children([a, b, c])
        .with_strategy(Strategy::RestForOne)
        .with_restart_intensity(5, Duration::from_secs(60))
        .with_notifier(notifier.clone())
        .build()
        .unwrap();

    let handle = start(spec, CancellationToken::new()).await.unwrap();
    wait_for_event_count(&events, 8).await;
    assert!(handle.terminate().await.is_none());
    drop(handle);
    drop(notifier);
    collector.await.unwrap();

    let tags: Vec<_> = events.lock().unwrap().iter().map(|e| (e.tag, e.node_path.clone())).collect();
    let failed_at = tags.iter().position(|t| t == &(EventTag::WorkerFailed, "root/b".into())).unwrap();
    let after = &tags[failed_at + 1..];

    // `a` started before `b` and must never be touched by the restart.
    assert!(!after.iter().any(|(_, p)| p == "root/a"));

    let restart_terms: Vec<_> =
        after.iter().take(1).filter(|(t, _)| *t == EventTag::WorkerTerminated).map(|(_, p)| p.clone()).collect();
    assert_eq!(restart_terms, vec!["root/c".to_string()]);

    let restarts: Vec<_> = after
        .iter()
        .skip(1)
        .take(2)
        .filter(|(t, _)| *t == EventTag::WorkerStarted)
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(restarts, vec!["root/b".to_string(), "root/c".to_string()]);
}

#[tokio::test]
async fn exceeding_restart_intensity_fails_the_supervisor() {
    let worker = worker_spec("flapping", always_fails()).unwrap().with_restart(RestartPolicy::Permanent);
    let spec = SupervisorSpecBuilder::new("root")
        .with_children([worker])
        .with_restart_intensity(1, Duration::from_secs(60))
        .build()
        .unwrap();

    let handle = start(spec, CancellationToken::new()).await.unwrap();
    let cause = handle.wait().await;
    assert!(matches!(
        cause,
        Some(ref e) if matches!(**e, SupervisorError::RestartIntensityExceeded { ref path, .. } if path == "root")
    ));
}

#[tokio::test]
async fn restart_start_failure_still_counts_against_the_intensity_budget() {
    // Budget of 1: the initial failure's restart ticks the counter to 1
    // (allowed), and that restart itself fails to start, ticking the
    // counter to 2 — which must trip the budget rather than being
    // swallowed and retried indefinitely.
    let worker =
        worker_spec("flaky", fails_to_restart_after_one_run()).unwrap().with_restart(RestartPolicy::Permanent);
    let spec = SupervisorSpecBuilder::new("root")
        .with_children([worker])
        .with_restart_intensity(1, Duration::from_secs(60))
        .build()
        .unwrap();

    let handle = start(spec, CancellationToken::new()).await.unwrap();
    let cause = handle.wait().await;
    assert!(matches!(
        cause,
        Some(ref e) if matches!(
            **e,
            SupervisorError::RestartIntensityExceeded { ref path, count, .. } if path == "root" && count == 2
        )
    ));
}
