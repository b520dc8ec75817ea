//! Progress channel between the executor and whoever watches a run.
//!
//! Sending never blocks and never fails: a run without a listener just
//! drops its events.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Executor side of the progress channel, cloned into every stage thread
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Publish `event`, dropping it if nobody is listening
    pub fn send(&self, event: Event) {
        if self.inner.send(event).is_err() {
            tracing::trace!("no progress listener, event dropped");
        }
    }
}

/// Listener side of the progress channel.
///
/// Iteration ends once the run is over and every sender is gone.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Next event, or `None` after the last sender is dropped
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Events in the order they were sent
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructor for a connected sender/receiver pair
pub struct EventChannel;

impl EventChannel {
    /// Unbounded pair; progress events are few and small
    pub fn new() -> (EventSender, EventReceiver) {
        let (inner_tx, inner_rx) = unbounded();
        (
            EventSender { inner: inner_tx },
            EventReceiver { inner: inner_rx },
        )
    }
}

/// Sender whose receiver is already gone, for runs nobody watches
pub fn null_sender() -> EventSender {
    EventChannel::new().0
}
