//! The event bus: an [`Event`] is emitted for every lifecycle transition of
//! every node in a supervision tree, and delivered to zero or more
//! [`EventNotifier`]s.
//!
//! Delivery is synchronous and best-effort from the supervisor's point of
//! view: `notify` is a plain (non-`async`) method, so the bounded-time
//! contract described in the design notes is enforced by the type signature
//! rather than by convention. An observer that wants to do expensive work in
//! response to an event is expected to hand it off to its own queue or task,
//! exactly as [`ChannelNotifier`] does.

// Layer 1: Standard library
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crates
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal modules
use crate::error::SupervisorError;

/// The nine concretely-emitted event tags.
///
/// The specification also names five "generic" tags (`ProcessStarted`,
/// `ProcessTerminated`, `ProcessStartFailed`, `ProcessFailed`,
/// `ProcessCompleted`). Rather than a separate constructible variant for
/// each, those are modeled as a derived classification via
/// [`EventTag::generic_kind`], since no event is ever emitted with a generic
/// tag directly — every concrete emission already knows whether it concerns
/// a worker or a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventTag {
    WorkerStarted,
    WorkerTerminated,
    WorkerStartFailed,
    WorkerFailed,
    WorkerCompleted,
    SupervisorStarted,
    SupervisorTerminated,
    SupervisorStartFailed,
    SupervisorFailed,
}

/// The generic classification of an [`EventTag`], matching the spec's
/// `Process*` alias family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GenericTag {
    ProcessStarted,
    ProcessTerminated,
    ProcessStartFailed,
    ProcessFailed,
    ProcessCompleted,
}

impl EventTag {
    /// Maps a specialized tag to its generic classification.
    pub fn generic_kind(&self) -> GenericTag {
        match self {
            EventTag::WorkerStarted | EventTag::SupervisorStarted => GenericTag::ProcessStarted,
            EventTag::WorkerTerminated | EventTag::SupervisorTerminated => {
                GenericTag::ProcessTerminated
            }
            EventTag::WorkerStartFailed | EventTag::SupervisorStartFailed => {
                GenericTag::ProcessStartFailed
            }
            EventTag::WorkerFailed | EventTag::SupervisorFailed => GenericTag::ProcessFailed,
            EventTag::WorkerCompleted => GenericTag::ProcessCompleted,
        }
    }

    /// `true` for tags that represent a failure (carry an `error`).
    pub fn is_failure(&self) -> bool {
        matches!(
            self.generic_kind(),
            GenericTag::ProcessFailed | GenericTag::ProcessStartFailed
        )
    }

    /// `true` for tags that mark a node as having reached a started/running
    /// state (used by the health monitor to clear a previously-failed path).
    pub fn is_started(&self) -> bool {
        matches!(self.generic_kind(), GenericTag::ProcessStarted)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventTag::WorkerStarted => "WorkerStarted",
            EventTag::WorkerTerminated => "WorkerTerminated",
            EventTag::WorkerStartFailed => "WorkerStartFailed",
            EventTag::WorkerFailed => "WorkerFailed",
            EventTag::WorkerCompleted => "WorkerCompleted",
            EventTag::SupervisorStarted => "SupervisorStarted",
            EventTag::SupervisorTerminated => "SupervisorTerminated",
            EventTag::SupervisorStartFailed => "SupervisorStartFailed",
            EventTag::SupervisorFailed => "SupervisorFailed",
        };
        f.write_str(s)
    }
}

/// An immutable record of a single lifecycle transition of a single node.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// What happened.
    pub tag: EventTag,
    /// Slash-joined path from root to the node this event concerns.
    pub node_path: String,
    /// When the event was captured.
    pub timestamp: DateTime<Utc>,
    /// Set for failure tags; `None` otherwise.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error_opt")]
    pub error: Option<Arc<SupervisorError>>,
    /// How long the termination took, when this event concerns a
    /// supervisor-initiated shutdown; `None` for spontaneous terminal events
    /// and for non-terminal tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<Duration>,
}

/// Serializes `SupervisorError` via its `Display` string, since the boxed
/// worker error it may wrap is not itself `Serialize`.
fn serialize_error_opt<S>(
    error: &Option<Arc<SupervisorError>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    error.as_ref().map(|e| e.to_string()).serialize(serializer)
}

impl Event {
    /// Builds an event with no error and no recorded stop time.
    pub fn new(tag: EventTag, node_path: impl Into<String>) -> Self {
        Self {
            tag,
            node_path: node_path.into(),
            timestamp: Utc::now(),
            error: None,
            stop_time: None,
        }
    }

    /// Attaches an error, typically for a failure tag.
    pub fn with_error(mut self, error: Arc<SupervisorError>) -> Self {
        self.error = Some(error);
        self
    }

    /// Attaches a recorded shutdown duration.
    pub fn with_stop_time(mut self, stop_time: Duration) -> Self {
        self.stop_time = Some(stop_time);
        self
    }
}

/// A sink that receives [`Event`]s.
///
/// Implementations must not block the caller for an unbounded time: a slow
/// or faulty observer must never stall the supervisor emitting the event.
pub trait EventNotifier: Send + Sync {
    /// Delivers `event` to this notifier.
    fn notify(&self, event: &Event);
}

/// Discards every event. The default notifier when `with_notifier` is never
/// called.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
    fn notify(&self, _event: &Event) {}
}

/// Adapts a plain closure into an [`EventNotifier`], mirroring the
/// closure-based notifier idiom of the system this crate's behavior is
/// grounded on.
pub struct FnNotifier<F>(F)
where
    F: Fn(&Event) + Send + Sync;

impl<F> FnNotifier<F>
where
    F: Fn(&Event) + Send + Sync,
{
    /// Wraps `f` as an [`EventNotifier`].
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventNotifier for FnNotifier<F>
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        (self.0)(event)
    }
}

/// Forwards every event to an unbounded `tokio::sync::mpsc` channel.
///
/// Because the channel is unbounded, `notify` never blocks on a slow
/// receiver; a dropped receiver simply causes future sends to be silently
/// discarded, which matches the "best-effort" contract in the spec.
pub struct ChannelNotifier {
    sender: tokio::sync::mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver it forwards to.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventNotifier for ChannelNotifier {
    fn notify(&self, event: &Event) {
        let _ = self.sender.send(event.clone());
    }
}

/// Fans a single event out to every notifier in the list, in order.
#[derive(Clone)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn EventNotifier>>,
}

impl CompositeNotifier {
    /// Builds a composite from a list of notifiers.
    pub fn new(notifiers: Vec<Arc<dyn EventNotifier>>) -> Self {
        Self { notifiers }
    }
}

impl EventNotifier for CompositeNotifier {
    fn notify(&self, event: &Event) {
        for notifier in &self.notifiers {
            notifier.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn generic_kind_maps_worker_and_supervisor_tags_together() {
        assert_eq!(EventTag::WorkerStarted.generic_kind(), GenericTag::ProcessStarted);
        assert_eq!(EventTag::SupervisorStarted.generic_kind(), GenericTag::ProcessStarted);
        assert_eq!(EventTag::WorkerFailed.generic_kind(), GenericTag::ProcessFailed);
        assert_eq!(EventTag::SupervisorFailed.generic_kind(), GenericTag::ProcessFailed);
    }

    #[test]
    fn is_failure_and_is_started_classify_correctly() {
        assert!(EventTag::WorkerFailed.is_failure());
        assert!(!EventTag::WorkerStarted.is_failure());
        assert!(EventTag::SupervisorStarted.is_started());
        assert!(!EventTag::SupervisorFailed.is_started());
    }

    #[test]
    fn composite_notifier_forwards_to_every_member() {
        let count = Arc::new(AtomicUsize::new(0));
        let a = count.clone();
        let b = count.clone();
        let composite = CompositeNotifier::new(vec![
            Arc::new(FnNotifier::new(move |_: &Event| {
                a.fetch_add(1, Ordering::SeqCst);
            })),
            Arc::new(FnNotifier::new(move |_: &Event| {
                b.fetch_add(1, Ordering::SeqCst);
            })),
        ]);
        composite.notify(&Event::new(EventTag::WorkerStarted, "root/one"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn channel_notifier_delivers_events_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(&Event::new(EventTag::WorkerStarted, "root/one"));
        notifier.notify(&Event::new(EventTag::WorkerTerminated, "root/one"));

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");
        assert_eq!(first.tag, EventTag::WorkerStarted);
        assert_eq!(second.tag, EventTag::WorkerTerminated);
    }

    #[test]
    fn channel_notifier_does_not_block_after_receiver_dropped() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        // Must not panic or block.
        notifier.notify(&Event::new(EventTag::WorkerStarted, "root/one"));
    }
}
