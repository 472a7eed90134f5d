//! The worker body contract: an arbitrary, cancellable async computation.

// Layer 1: Standard library
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// Layer 2: Third-party crates
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal modules
use crate::error::BoxError;
use crate::spec::policy::ExitKind;

/// How a worker body's future resolved.
pub enum WorkerOutcome {
    /// The computation finished successfully.
    Completed,
    /// The computation finished with an error.
    Failed(BoxError),
    /// The computation unwound because it observed cancellation.
    Aborted,
}

impl fmt::Debug for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Completed => f.write_str("Completed"),
            WorkerOutcome::Failed(e) => write!(f, "Failed({e})"),
            WorkerOutcome::Aborted => f.write_str("Aborted"),
        }
    }
}

impl WorkerOutcome {
    /// Classifies this outcome into the policy-table's [`ExitKind`].
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            WorkerOutcome::Completed => ExitKind::Completed,
            WorkerOutcome::Failed(_) => ExitKind::Failed,
            WorkerOutcome::Aborted => ExitKind::Aborted,
        }
    }
}

/// The future a worker body evaluates to.
pub type WorkerFuture = Pin<Box<dyn Future<Output = WorkerOutcome> + Send>>;

/// A worker body: given a [`WorkerContext`], returns a future that runs
/// until completion, failure, or cooperative cancellation.
pub type WorkerBody = Arc<dyn Fn(WorkerContext) -> WorkerFuture + Send + Sync>;

/// What a worker body receives when spawned.
///
/// A worker is expected to call [`WorkerContext::mark_ready`] once its
/// initialization logic has run and it is prepared to observe cancellation;
/// this is the "started acknowledgement" the supervisor waits on before
/// moving on to the next sibling (§4.E.1). If the body's future resolves
/// *before* `mark_ready` is called, that resolution is treated as a start
/// failure rather than a normal terminal outcome.
#[derive(Clone)]
pub struct WorkerContext {
    cancel: CancellationToken,
    ready: watch::Sender<bool>,
}

impl WorkerContext {
    pub(crate) fn new(cancel: CancellationToken, ready: watch::Sender<bool>) -> Self {
        Self { cancel, ready }
    }

    /// The token to observe for cancellation.
    pub fn cancelled(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signals that initialization is complete and the worker is ready to
    /// receive cancellation. Idempotent; safe to call more than once.
    pub fn mark_ready(&self) {
        let _ = self.ready.send(true);
    }
}

/// Builds a worker body that marks itself ready immediately and then simply
/// waits for cancellation, returning [`WorkerOutcome::Aborted`]. This is the
/// common "do nothing but stay alive" shape used throughout the scenario
/// tests (the spec's `WaitDoneWorker`).
pub fn wait_for_cancellation() -> WorkerBody {
    Arc::new(|ctx: WorkerContext| -> WorkerFuture {
        Box::pin(async move {
            ctx.mark_ready();
            ctx.cancelled().cancelled().await;
            WorkerOutcome::Aborted
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_cancellation_resolves_aborted_on_cancel() {
        let token = CancellationToken::new();
        let (tx, _rx) = watch::channel(false);
        let ctx = WorkerContext::new(token.clone(), tx);
        let body = wait_for_cancellation();
        let fut = body(ctx);
        token.cancel();
        let outcome = fut.await;
        assert!(matches!(outcome, WorkerOutcome::Aborted));
    }

    #[test]
    fn exit_kind_classification() {
        assert_eq!(WorkerOutcome::Completed.exit_kind(), ExitKind::Completed);
        assert_eq!(WorkerOutcome::Failed("boom".into()).exit_kind(), ExitKind::Failed);
        assert_eq!(WorkerOutcome::Aborted.exit_kind(), ExitKind::Aborted);
    }
}
