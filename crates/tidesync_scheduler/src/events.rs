//! Event source interface.
//!
//! External collaborators (app lifecycle, network reachability, local write
//! paths) feed the scheduler through a channel rather than registered
//! callbacks: the subscription's lifetime is the channel's, tied to
//! `initialize`/`shutdown`.

use tokio::sync::mpsc;

/// A notification from an external event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// App moved to the foreground (`true`) or background (`false`).
    Lifecycle {
        /// Whether the app is now in the foreground.
        foreground: bool,
    },
    /// Network reachability changed.
    Reachability {
        /// Whether the network is now reachable.
        reachable: bool,
    },
    /// A local record was created, updated or deleted.
    RecordChanged,
}

/// Sender half handed to event sources.
pub type EventSender = mpsc::UnboundedSender<SourceEvent>;

/// Creates the event channel connecting sources to a scheduler.
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<SourceEvent>) {
    mpsc::unbounded_channel()
}
