//! # Event bus.
//!
//! [`Bus`] fans every published [`Event`] out to all live receivers through a
//! `tokio::sync::broadcast` ring.
//!
//! ```text
//!   Coordinator ─┐                   ┌──► Manager::subscribe() receivers
//!   Manager     ─┼──► Bus (ring) ────┤
//!   Subscriber  ─┘                   └──► subscriber listener ──► SubscriberSet
//!   workers
//! ```
//!
//! Publishing never waits. A receiver that falls more than `capacity` events
//! behind gets `RecvError::Lagged(n)` and loses the `n` oldest ones. Events
//! published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publishing handle.
#[derive(Clone, Debug)]
pub struct Bus {
    sender: broadcast::Sender<Event>,
}

impl Bus {
    /// `capacity` is the ring size; 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, ev: Event) {
        // Err only means there is no receiver right now.
        let _ = self.sender.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
