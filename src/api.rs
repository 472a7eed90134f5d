//! The public entry point: start a [`SupervisorSpec`] tree and get back a
//! handle that can be waited on, terminated, and inspected for a crash.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party crates
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

// Layer 3: Internal modules
use crate::error::SupervisorError;
use crate::event::{EventNotifier, NoopNotifier};
use crate::runtime::{run_monitor_loop, start_tree};
use crate::spec::{NodeSpec, SupervisorSpec};

/// Starts `spec` as a root supervision tree.
///
/// `scope` is the cancellation token the caller uses to bind this tree's
/// lifetime to some outer context (e.g. process shutdown); the tree derives
/// its own child token from it, so cancelling `scope` — directly, or through
/// [`RootHandle::terminate`] — tears the whole tree down. If `spec` carries
/// no notifier (via
/// [`SupervisorSpecBuilder::with_notifier`](crate::spec::SupervisorSpecBuilder::with_notifier)),
/// events are simply discarded.
///
/// Returns `Err` if the root itself, or any child visited during the
/// initial sequential start, fails to start.
pub async fn start(spec: SupervisorSpec, scope: CancellationToken) -> Result<RootHandle, SupervisorError> {
    let spec = Arc::new(spec);
    let notifier: Arc<dyn EventNotifier> = spec.notifier().unwrap_or_else(|| Arc::new(NoopNotifier));
    let root_name = spec.name().to_string();
    let root_token = scope.child_token();

    let runtime = start_tree(spec.clone(), root_token.clone(), root_name.clone(), notifier).await?;

    let driver = tokio::spawn(run_monitor_loop(runtime));
    let outcome: Shared<BoxFuture<'static, Result<(), Arc<SupervisorError>>>> = async move {
        match driver.await {
            Ok(result) => result.map_err(Arc::new),
            Err(join_err) => Err(Arc::new(SupervisorError::TerminationFailed {
                path: format!("{root_name} (monitor task panicked: {join_err})"),
            })),
        }
    }
    .boxed()
    .shared();

    // Drives the shared outcome to completion even if no caller ever invokes
    // `wait`; the tree itself is already running regardless, via `driver`.
    tokio::spawn({
        let outcome = outcome.clone();
        async move {
            let _ = outcome.await;
        }
    });

    Ok(RootHandle { spec, cancel: root_token, outcome })
}

/// A handle to a running supervision tree.
///
/// Cloning is intentionally not provided; callers that need to share it
/// across tasks should wrap it in an `Arc`. Every method takes `&self` and
/// can be called repeatedly and from multiple call sites concurrently, since
/// the underlying outcome is backed by [`futures::future::Shared`].
pub struct RootHandle {
    spec: Arc<SupervisorSpec>,
    cancel: CancellationToken,
    outcome: Shared<BoxFuture<'static, Result<(), Arc<SupervisorError>>>>,
}

impl std::fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootHandle").field("spec_name", &self.spec.name()).finish_non_exhaustive()
    }
}

impl RootHandle {
    /// Waits for the tree to terminate, whether through
    /// [`RootHandle::terminate`] or because it failed on its own (e.g. its
    /// restart-intensity budget was exceeded). Returns the cause on a
    /// failed exit, `None` on a clean one.
    pub async fn wait(&self) -> Option<Arc<SupervisorError>> {
        self.outcome.clone().await.err()
    }

    /// Cancels the whole tree and waits for it to finish tearing down.
    pub async fn terminate(&self) -> Option<Arc<SupervisorError>> {
        self.cancel.cancel();
        self.wait().await
    }

    /// The error the tree crashed with, if it has already terminated with
    /// one. Returns `None` both while still running and after a clean
    /// termination.
    pub fn get_crash_error(&self) -> Option<Arc<SupervisorError>> {
        self.outcome.peek().and_then(|result| result.clone().err())
    }

    /// The root's declared, immediate children, in declaration order.
    /// Reflects the spec as built, not live process state — a child
    /// currently inert after exhausting its own restart attempts still
    /// appears here.
    pub fn get_children(&self) -> &[NodeSpec] {
        self.spec.children()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{wait_for_cancellation, worker_spec, SupervisorSpecBuilder};

    #[tokio::test]
    async fn start_and_terminate_a_single_worker() {
        let worker = worker_spec("only", wait_for_cancellation()).unwrap();
        let spec = SupervisorSpecBuilder::new("root").with_children([worker]).build().unwrap();

        let handle = start(spec, CancellationToken::new()).await.unwrap();
        assert_eq!(handle.get_children().iter().map(|c| c.name()).collect::<Vec<_>>(), vec!["only"]);
        assert!(handle.terminate().await.is_none());
        assert!(handle.get_crash_error().is_none());
    }

    #[tokio::test]
    async fn terminate_is_idempotent_across_callers() {
        let worker = worker_spec("only", wait_for_cancellation()).unwrap();
        let spec = SupervisorSpecBuilder::new("root").with_children([worker]).build().unwrap();

        let handle = start(spec, CancellationToken::new()).await.unwrap();
        let (first, second) = tokio::join!(handle.terminate(), handle.terminate());
        assert!(first.is_none());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn external_scope_cancellation_tears_down_the_tree() {
        let worker = worker_spec("only", wait_for_cancellation()).unwrap();
        let spec = SupervisorSpecBuilder::new("root").with_children([worker]).build().unwrap();

        let scope = CancellationToken::new();
        let handle = start(spec, scope.clone()).await.unwrap();
        scope.cancel();
        assert!(handle.wait().await.is_none());
    }
}
