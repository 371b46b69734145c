//! Lifecycle events and the channel that carries them.
//!
//! The supervisor, the service keeper and the subscriber workers publish [`Event`]s
//! into one broadcast ring owned by the application. Readers are the subscriber
//! workers and any receiver handed out by
//! [`Application::subscribe`](crate::Application::subscribe); each reader gets its own
//! cursor, so a slow reader only ever loses its own backlog.

mod event;

pub use event::{Event, EventKind};

use tokio::sync::broadcast;

/// Publishing side of the application's event ring.
///
/// Publishing never waits. Events sent while nobody listens are gone.
#[derive(Clone, Debug)]
pub(crate) struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// `capacity` is clamped to at least 1.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// A reader positioned after the last published event.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
