//! # suptree - BEAM-inspired supervision trees for tokio
//!
//! A supervision tree lets an application declare a static tree of
//! long-running workers and supervisors; the runtime starts them in a
//! defined order, observes their termination, restarts them according to
//! per-node policies, and shuts the tree down cleanly on request or on
//! unrecoverable failure.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use suptree::{start, wait_for_cancellation, worker_spec, SupervisorSpecBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let worker = worker_spec("pinger", wait_for_cancellation())?;
//! let spec = SupervisorSpecBuilder::new("root")
//!     .with_children([worker])
//!     .with_restart_intensity(3, Duration::from_secs(5))
//!     .build()?;
//!
//! let handle = start(spec, CancellationToken::new()).await?;
//! handle.terminate().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Module organization
//!
//! - [`event`] - the immutable `Event` record and the `EventNotifier` sink trait
//! - [`clock`] - the `Clock` abstraction the health monitor tests against
//! - [`spec`] - the immutable node specification model and its fluent builder
//! - [`runtime`] - the supervisor state machine: start, monitor, restart, terminate
//! - [`health`] - a pure `EventNotifier` consumer reporting tree liveness
//! - [`api`] - `start`/`RootHandle`, the only entry point applications need
//! - [`error`] - the `SupervisorError` taxonomy shared by every layer above
//!
//! # See also
//!
//! - [Erlang/OTP supervision](https://www.erlang.org/doc/system/sup_princ.html) - the model this
//!   crate draws its vocabulary from.

pub mod api;
pub mod clock;
pub mod error;
pub mod event;
pub mod health;
pub mod runtime;
pub mod spec;

pub use api::{start, RootHandle};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use error::{BoxError, SupervisorError};
pub use event::{
    ChannelNotifier, CompositeNotifier, Event, EventNotifier, EventTag, FnNotifier, GenericTag,
    NoopNotifier,
};
pub use health::{HealthMonitor, HealthReport};
pub use runtime::{run_monitor_loop, start_tree, terminate_tree, ChildExit, ChildId, SupervisorRuntime};
pub use spec::{
    wait_for_cancellation, worker_spec, ExitKind, NodeSpec, NodeSpecExt, RestartIntensity,
    RestartPolicy, ShutdownPolicy, StartOrder, Strategy, SupervisorSpec, SupervisorSpecBuilder,
    WorkerBody, WorkerContext, WorkerFuture, WorkerOutcome, WorkerSpec,
};
