//! # Subscriber fan-out.
//!
//! Each subscriber gets a lane: a bounded queue drained by its own worker.
//!
//! ```text
//!            ┌─► lane "log"    [q] ─► worker ─► LogWriter::on_event
//! emit(ev) ──┼─► lane "audit"  [q] ─► worker ─► Audit::on_event
//!            └─► lane ...                 └─ panic ─► Bus: SubscriberPanicked
//! ```
//!
//! `emit` never waits: a full or closed lane drops the event for that subscriber
//! alone and reports `SubscriberOverflow` on the bus. Within a lane, events keep
//! bus order. A panic in `on_event` is reported and the worker carries on with
//! the next event.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Bounded, non-blocking delivery of events to a fixed set of subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Opens one lane per subscriber and spawns its worker.
    ///
    /// Must be called inside a tokio runtime. Diagnostics go to `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    queue,
                };
                (lane, tokio::spawn(drive(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Offers `event` to every lane without waiting.
    pub fn emit(&self, event: Event) {
        // Overflow reports are not re-reported, or a stuck lane would loop.
        let reportable = event.kind != EventKind::SubscriberOverflow;
        let event = Arc::new(event);
        for lane in &self.lanes {
            let why = match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if reportable {
                self.bus.publish(Event::subscriber_overflow(lane.name, why));
            }
        }
    }

    /// Closes every lane and waits until the workers have drained them.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*payload)));
        }
    }
}
