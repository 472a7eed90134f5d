//! The supervisor state machine: starts children in order, waits for the
//! first one to exit, applies the restart-strategy decision, and tears the
//! subtree down on request or on exhausting its restart-intensity budget.
//!
//! A nested supervisor is started and monitored exactly like the root: it is
//! just a [`ChildRuntime`] whose join handle wraps another invocation of
//! [`run_monitor_loop`]. This is what lets restart strategies, cancellation,
//! and shutdown ordering apply uniformly regardless of nesting depth.

// Layer 1: Standard library
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration as StdDuration;

// Layer 2: Third-party crates
use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

// Layer 3: Internal modules
use crate::error::{BoxError, SupervisorError};
use crate::event::{Event, EventNotifier, EventTag};
use crate::runtime::strategy::affected_children;
use crate::runtime::{ChildExit, ChildId};
use crate::spec::policy::RestartIntensityTracker;
use crate::spec::{NodeSpec, SupervisorSpec, WorkerContext, WorkerOutcome, WorkerSpec};

/// One started child: its live task plus enough of its spec to restart it
/// later without re-consulting the declaring supervisor's spec tree.
struct ChildRuntime {
    path: String,
    spec: NodeSpec,
    cancel: CancellationToken,
    join: JoinHandle<ChildExit>,
    #[allow(dead_code)] // surfaced through introspection in a future API, not read yet
    started_at: DateTime<Utc>,
}

/// A started supervisor subtree.
///
/// Opaque outside [`crate::runtime`]: callers drive it only through
/// [`start_tree`], [`run_monitor_loop`] and [`terminate_tree`].
pub struct SupervisorRuntime {
    path: String,
    spec: Arc<SupervisorSpec>,
    own_cancel: CancellationToken,
    notifier: Arc<dyn EventNotifier>,
    children: HashMap<ChildId, ChildRuntime>,
    /// Actual start order (also the order successors are computed against
    /// for `RestForOne`). A child permanently removed (its policy decided
    /// not to restart it) is dropped from here too.
    order: Vec<ChildId>,
    intensity: RestartIntensityTracker,
}

impl SupervisorRuntime {
    fn spec_for(&self, id: &ChildId) -> Option<NodeSpec> {
        self.spec.children().iter().find(|c| c.name() == id.0.as_str()).cloned()
    }
}

fn child_path(parent_path: &str, name: &str) -> String {
    format!("{parent_path}/{name}")
}

fn elapsed_since(start: DateTime<Utc>) -> StdDuration {
    (Utc::now() - start).to_std().unwrap_or(StdDuration::ZERO)
}

/// Starts every child of `spec` in its configured start order, aborting and
/// rolling back already-started siblings on the first failure.
///
/// Boxed because a [`NodeSpec::Supervisor`] child recurses back into this
/// same function through [`start_supervisor_child`] — an async fn cannot
/// call itself directly without indirection.
pub fn start_tree(
    spec: Arc<SupervisorSpec>,
    own_token: CancellationToken,
    path: String,
    notifier: Arc<dyn EventNotifier>,
) -> Pin<Box<dyn Future<Output = Result<SupervisorRuntime, SupervisorError>> + Send>> {
    Box::pin(async move {
        let order_specs = spec.start_order();
        let mut started: Vec<ChildRuntime> = Vec::with_capacity(order_specs.len());

        for node in order_specs.iter().copied() {
            match start_child(node, &own_token, &path, &notifier).await {
                Ok(child) => started.push(child),
                Err(start_err) => {
                    stop_started_children(started, &notifier).await;
                    let err = SupervisorError::StartFailed {
                        path: path.clone(),
                        source: Some(Box::new(start_err)),
                    };
                    tracing::warn!(path = %path, error = %err, "supervisor failed to start");
                    notifier.notify(
                        &Event::new(EventTag::SupervisorStartFailed, path.clone())
                            .with_error(Arc::new(err.snapshot())),
                    );
                    return Err(err);
                }
            }
        }

        notifier.notify(&Event::new(EventTag::SupervisorStarted, path.clone()));
        tracing::debug!(path = %path, children = started.len(), "supervisor started");

        let intensity = RestartIntensityTracker::new(spec.restart_intensity());
        let order = started.iter().map(ChildRuntime::id).collect::<Vec<_>>();
        let children = started.into_iter().map(|c| (c.id(), c)).collect::<HashMap<_, _>>();

        Ok(SupervisorRuntime { path, spec, own_cancel: own_token, notifier, children, order, intensity })
    })
}

impl ChildRuntime {
    /// The stable key for this child, derived from its own spec's name
    /// (sibling names are validated unique at spec-build time).
    fn id(&self) -> ChildId {
        ChildId(self.spec.name().to_string())
    }
}

async fn start_child(
    node: &NodeSpec,
    own_token: &CancellationToken,
    own_path: &str,
    notifier: &Arc<dyn EventNotifier>,
) -> Result<ChildRuntime, SupervisorError> {
    let path = child_path(own_path, node.name());
    match node {
        NodeSpec::Worker(w) => start_worker(w.clone(), own_token, path, notifier).await,
        NodeSpec::Supervisor(s) => start_supervisor_child(s.clone(), own_token, path, notifier).await,
    }
}

/// Races a worker body's "ready" signal against its future resolving.
///
/// If the ready signal (sent via [`WorkerContext::mark_ready`]) arrives
/// first, the worker is considered started and its task keeps running
/// independently. If the future resolves first, that resolution — whatever
/// it is — is a start failure, not a normal terminal outcome.
async fn start_worker(
    spec: Arc<WorkerSpec>,
    parent_token: &CancellationToken,
    path: String,
    notifier: &Arc<dyn EventNotifier>,
) -> Result<ChildRuntime, SupervisorError> {
    let cancel = parent_token.child_token();
    let (ready_tx, mut ready_rx) = watch::channel(false);
    let ctx = WorkerContext::new(cancel.clone(), ready_tx);
    let body = spec.body.clone();
    let mut join: JoinHandle<ChildExit> = tokio::spawn(async move { ChildExit::Worker(body(ctx).await) });

    enum Race {
        Ready,
        ReadySenderDropped,
        Exited(Result<ChildExit, JoinError>),
    }

    let race = tokio::select! {
        biased;
        changed = ready_rx.changed() => {
            if changed.is_ok() { Race::Ready } else { Race::ReadySenderDropped }
        }
        result = &mut join => Race::Exited(result),
    };

    match race {
        Race::Ready => {
            notifier.notify(&Event::new(EventTag::WorkerStarted, path.clone()));
            tracing::debug!(path = %path, "worker started");
            Ok(ChildRuntime {
                path,
                spec: NodeSpec::Worker(spec),
                cancel,
                join,
                started_at: Utc::now(),
            })
        }
        Race::ReadySenderDropped => {
            // The sender lives inside the spawned task's context; it is only
            // dropped once that task has already finished without ever
            // calling `mark_ready`.
            Err(emit_worker_start_failure(notifier, &path, join.await))
        }
        Race::Exited(result) => Err(emit_worker_start_failure(notifier, &path, result)),
    }
}

fn emit_worker_start_failure(
    notifier: &Arc<dyn EventNotifier>,
    path: &str,
    result: Result<ChildExit, JoinError>,
) -> SupervisorError {
    let source: Option<BoxError> = match result {
        Ok(ChildExit::Worker(WorkerOutcome::Failed(e))) => Some(e),
        Ok(ChildExit::Worker(WorkerOutcome::Completed)) => {
            Some("worker completed before signalling ready".into())
        }
        Ok(ChildExit::Worker(WorkerOutcome::Aborted)) => {
            Some("worker was cancelled before signalling ready".into())
        }
        Ok(ChildExit::Supervisor(_)) => {
            unreachable!("a worker's join handle only ever yields ChildExit::Worker")
        }
        Err(join_err) => Some(Box::new(join_err)),
    };
    let err = SupervisorError::StartFailed { path: path.to_string(), source };
    tracing::warn!(path, error = %err, "worker failed to start");
    notifier.notify(&Event::new(EventTag::WorkerStartFailed, path).with_error(Arc::new(err.snapshot())));
    err
}

async fn start_supervisor_child(
    spec: Arc<SupervisorSpec>,
    parent_token: &CancellationToken,
    path: String,
    notifier: &Arc<dyn EventNotifier>,
) -> Result<ChildRuntime, SupervisorError> {
    let own_token = parent_token.child_token();
    let runtime = start_tree(spec.clone(), own_token.clone(), path.clone(), notifier.clone()).await?;
    let join = tokio::spawn(async move { ChildExit::Supervisor(run_monitor_loop(runtime).await) });
    Ok(ChildRuntime {
        path,
        spec: NodeSpec::Supervisor(spec),
        cancel: own_token,
        join,
        started_at: Utc::now(),
    })
}

async fn stop_started_children(started: Vec<ChildRuntime>, notifier: &Arc<dyn EventNotifier>) {
    for child in started.into_iter().rev() {
        stop_child(child, notifier).await;
    }
}

/// Cancels and joins a single still-running child, honoring its shutdown
/// policy's timeout, and reports its terminal event. Returns `true` if the
/// child's termination counts as a failure.
async fn stop_child(child: ChildRuntime, notifier: &Arc<dyn EventNotifier>) -> bool {
    let ChildRuntime { path, spec, cancel, join, .. } = child;
    let shutdown = spec.shutdown_policy();
    cancel.cancel();
    let cancel_sent_at = Utc::now();

    match shutdown.timeout() {
        Some(timeout) => match tokio::time::timeout(timeout, join).await {
            Ok(join_result) => finish_stop(notifier, &path, &spec, join_result, cancel_sent_at),
            Err(_elapsed) => emit_shutdown_timeout(notifier, &path, &spec, timeout),
        },
        None => finish_stop(notifier, &path, &spec, join.await, cancel_sent_at),
    }
}

fn finish_stop(
    notifier: &Arc<dyn EventNotifier>,
    path: &str,
    spec: &NodeSpec,
    join_result: Result<ChildExit, JoinError>,
    cancel_sent_at: DateTime<Utc>,
) -> bool {
    let stop_time = elapsed_since(cancel_sent_at);
    match join_result {
        Ok(exit) => emit_exit_event(notifier, path, spec, exit, Some(stop_time)),
        Err(join_err) => emit_panic_event(notifier, path, spec, join_err, stop_time),
    }
}

fn emit_panic_event(
    notifier: &Arc<dyn EventNotifier>,
    path: &str,
    spec: &NodeSpec,
    join_err: JoinError,
    stop_time: StdDuration,
) -> bool {
    let tag = match spec {
        NodeSpec::Worker(_) => EventTag::WorkerFailed,
        NodeSpec::Supervisor(_) => EventTag::SupervisorFailed,
    };
    let err = SupervisorError::WorkerFailed { path: path.to_string(), source: Some(Box::new(join_err)) };
    tracing::warn!(path, error = %err, "child task panicked");
    notifier.notify(&Event::new(tag, path).with_error(Arc::new(err.snapshot())).with_stop_time(stop_time));
    true
}

fn emit_shutdown_timeout(
    notifier: &Arc<dyn EventNotifier>,
    path: &str,
    spec: &NodeSpec,
    timeout: StdDuration,
) -> bool {
    let tag = match spec {
        NodeSpec::Worker(_) => EventTag::WorkerFailed,
        NodeSpec::Supervisor(_) => EventTag::SupervisorFailed,
    };
    let err = SupervisorError::ShutdownTimeout { path: path.to_string(), timeout };
    tracing::warn!(path, "child did not terminate within its shutdown timeout");
    notifier.notify(&Event::new(tag, path).with_error(Arc::new(err)).with_stop_time(timeout));
    true
}

/// Reports a resolved child exit and returns whether it counts as a
/// failure. For a [`NodeSpec::Supervisor`] child this never emits anything:
/// the subtree's own monitor loop already reported its own terminal event
/// before handing this `Result` up.
fn emit_exit_event(
    notifier: &Arc<dyn EventNotifier>,
    path: &str,
    spec: &NodeSpec,
    exit: ChildExit,
    stop_time: Option<StdDuration>,
) -> bool {
    match (spec, exit) {
        (NodeSpec::Worker(_), ChildExit::Worker(outcome)) => match outcome {
            WorkerOutcome::Failed(source) => {
                let err = SupervisorError::WorkerFailed { path: path.to_string(), source: Some(source) };
                let mut event = Event::new(EventTag::WorkerFailed, path).with_error(Arc::new(err.snapshot()));
                if let Some(st) = stop_time {
                    event = event.with_stop_time(st);
                }
                notifier.notify(&event);
                true
            }
            WorkerOutcome::Completed => {
                let mut event = Event::new(EventTag::WorkerCompleted, path);
                if let Some(st) = stop_time {
                    event = event.with_stop_time(st);
                }
                notifier.notify(&event);
                false
            }
            WorkerOutcome::Aborted => {
                let mut event = Event::new(EventTag::WorkerTerminated, path);
                if let Some(st) = stop_time {
                    event = event.with_stop_time(st);
                }
                notifier.notify(&event);
                false
            }
        },
        (NodeSpec::Supervisor(_), ChildExit::Supervisor(result)) => result.is_err(),
        _ => unreachable!("a child's spec kind always matches its own ChildExit kind"),
    }
}

/// Drives a started subtree until its own cancellation fires or it exceeds
/// its restart-intensity budget, then tears it down.
///
/// Rebuilds its child-exit combinator every loop iteration rather than
/// holding one [`FuturesUnordered`] across iterations: after each exit the
/// active child set may have changed (a restart, a permanent removal), so a
/// stale combinator would either miss new tasks or poll dropped ones.
///
/// Boxed for the same reason as [`start_tree`]: a nested supervisor's
/// [`start_supervisor_child`] spawns another invocation of this very
/// function, which would otherwise make its own future type infinitely
/// recursive.
pub fn run_monitor_loop(
    runtime: SupervisorRuntime,
) -> Pin<Box<dyn Future<Output = Result<(), SupervisorError>> + Send>> {
    Box::pin(run_monitor_loop_inner(runtime))
}

async fn run_monitor_loop_inner(mut runtime: SupervisorRuntime) -> Result<(), SupervisorError> {
    loop {
        if runtime.children.is_empty() {
            runtime.own_cancel.cancelled().await;
            return terminate_tree(runtime).await;
        }

        let own_cancel = runtime.own_cancel.clone();
        let mut pending: FuturesUnordered<_> = runtime
            .children
            .iter_mut()
            .map(|(id, child)| {
                let id = id.clone();
                async move { (id, (&mut child.join).await) }
            })
            .collect();

        let next = tokio::select! {
            biased;
            _ = own_cancel.cancelled() => {
                drop(pending);
                return terminate_tree(runtime).await;
            }
            next = pending.next() => next,
        };
        drop(pending);

        let Some((id, join_result)) = next else {
            // FuturesUnordered is non-empty by construction (guarded above);
            // a spurious `None` must not be treated as a crash.
            continue;
        };

        if let Err(fatal) = handle_child_exit(&mut runtime, id, join_result).await {
            return terminate_tree_due_to_fatal(runtime, fatal).await;
        }
    }
}

async fn handle_child_exit(
    runtime: &mut SupervisorRuntime,
    id: ChildId,
    join_result: Result<ChildExit, JoinError>,
) -> Result<(), SupervisorError> {
    let Some(child) = runtime.children.remove(&id) else {
        return Ok(());
    };
    let ChildRuntime { path, spec, .. } = child;

    let exit = match join_result {
        Ok(exit) => exit,
        Err(join_err) => match &spec {
            NodeSpec::Worker(_) => ChildExit::Worker(WorkerOutcome::Failed(Box::new(join_err))),
            NodeSpec::Supervisor(_) => {
                ChildExit::Supervisor(Err(SupervisorError::TerminationFailed { path: path.clone() }))
            }
        },
    };

    let exit_kind = exit.exit_kind();
    emit_exit_event(&runtime.notifier, &path, &spec, exit, None);

    if !spec.restart_policy().should_restart(exit_kind) {
        runtime.order.retain(|existing| existing != &id);
        return Ok(());
    }

    if runtime.intensity.record(Utc::now()) {
        let err = SupervisorError::RestartIntensityExceeded {
            path: runtime.path.clone(),
            count: runtime.intensity.count(),
            max: runtime.spec.restart_intensity().max_restarts(),
            window: runtime.spec.restart_intensity().window(),
        };
        tracing::error!(path = %runtime.path, error = %err, "restart intensity exceeded");
        return Err(err);
    }

    let affected = affected_children(runtime.spec.strategy(), &id, &runtime.order);
    let own_token = runtime.own_cancel.clone();
    let notifier = runtime.notifier.clone();

    for sibling_id in affected.iter().filter(|&sid| sid != &id).rev() {
        if let Some(sibling) = runtime.children.remove(sibling_id) {
            stop_child(sibling, &notifier).await;
        }
    }

    for restart_id in &affected {
        let Some(node_spec) = runtime.spec_for(restart_id) else {
            continue;
        };
        match start_child(&node_spec, &own_token, &runtime.path, &notifier).await {
            Ok(restarted) => {
                runtime.children.insert(restart_id.clone(), restarted);
            }
            Err(_) => {
                // `start_child` already emitted `*StartFailed`; the child
                // stays absent from `children` until the next
                // externally-triggered restart. A restart-start failure
                // still costs budget, same as the original triggering
                // failure, so repeated fail-to-restart attempts trip
                // `RestartIntensityExceeded` instead of retrying forever.
                if runtime.intensity.record(Utc::now()) {
                    let err = SupervisorError::RestartIntensityExceeded {
                        path: runtime.path.clone(),
                        count: runtime.intensity.count(),
                        max: runtime.spec.restart_intensity().max_restarts(),
                        window: runtime.spec.restart_intensity().window(),
                    };
                    tracing::error!(path = %runtime.path, error = %err, "restart intensity exceeded");
                    return Err(err);
                }
            }
        }
    }

    Ok(())
}

async fn terminate_tree_due_to_fatal(
    runtime: SupervisorRuntime,
    cause: SupervisorError,
) -> Result<(), SupervisorError> {
    let SupervisorRuntime { path, notifier, mut children, order, .. } = runtime;
    for id in order.into_iter().rev() {
        if let Some(child) = children.remove(&id) {
            stop_child(child, &notifier).await;
        }
    }
    tracing::error!(path = %path, error = %cause, "supervisor terminating after exceeding restart intensity");
    notifier.notify(&Event::new(EventTag::SupervisorFailed, path).with_error(Arc::new(cause.snapshot())));
    Err(cause)
}

/// Cancels and joins every remaining child in reverse start order, then
/// reports this supervisor's own terminal event.
pub async fn terminate_tree(runtime: SupervisorRuntime) -> Result<(), SupervisorError> {
    let SupervisorRuntime { path, notifier, mut children, order, .. } = runtime;
    let mut any_failed = false;
    for id in order.into_iter().rev() {
        if let Some(child) = children.remove(&id) {
            if stop_child(child, &notifier).await {
                any_failed = true;
            }
        }
    }

    if any_failed {
        tracing::warn!(path = %path, "supervisor terminated with at least one failed child");
        notifier.notify(&Event::new(EventTag::SupervisorFailed, path.clone()));
        Err(SupervisorError::TerminationFailed { path })
    } else {
        tracing::debug!(path = %path, "supervisor terminated cleanly");
        notifier.notify(&Event::new(EventTag::SupervisorTerminated, path));
        Ok(())
    }
}
