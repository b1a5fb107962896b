//! # Manager events.
//!
//! Everything observable about a running manager is published as an [`Event`]:
//! lifecycle latches, task transitions, priority changes, and diagnostics of the
//! subscriber fan-out itself.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter. The coordinator publishes while it
//! processes, so for a single reconciliation every `TaskPaused` is numbered
//! before every `TaskResumed`.
//!
//! ## Example
//! ```rust
//! use taskrank::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskResumed)
//!     .with_task("space-1")
//!     .with_running(2);
//!
//! assert!(ev.is_for("space-1"));
//! assert_eq!(ev.running, Some(2));
//! assert!(ev.reason.is_none());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
///
/// The doc of each variant lists the optional [`Event`] fields it fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `run` dispatched the buffered tasks and fired `started`. Published before
    /// the first reconciliation.
    ManagerStarted,
    /// `wait_and_close` saw the drain and fired `closed`. Configured subscribers
    /// receive nothing after it.
    ManagerClosed,

    /// Task registered and dispatched in the paused state. `task`.
    TaskAdded,
    /// Task refused; it was completed without running. `task`, `reason` (error label).
    TaskRejected,
    /// Gate fired: the task joined the running set. `task`, `running`.
    TaskResumed,
    /// Fresh gate armed: the task left the running set. `task`, `running`.
    TaskPaused,
    /// `run` returned `Ok`. `task`.
    TaskFinished,
    /// `run` returned an error, panicked or was cancelled. `task`, `reason`.
    TaskFailed,

    /// Priority list replaced. `reason`: `"update"` (explicit list), `"refresh"`
    /// (sorter) or `"run"` (list set before `run`).
    ///
    /// Before `run` this only reaches receivers from
    /// [`Manager::subscribe`](crate::Manager::subscribe); configured subscribers
    /// start listening when `run` starts. `run` reports the list it starts with
    /// once more: `"refresh"` with a sorter, `"run"` for a pre-start list.
    PriorityUpdated,
    /// The list length differs from the number of live tasks. `reason`: `"priority=<n> tasks=<m>"`.
    PriorityMismatch,

    /// A subscriber queue refused an event. `task`: subscriber name, `reason`.
    SubscriberOverflow,
    /// A subscriber panicked while handling an event. `task`: subscriber name, `reason`: panic text.
    SubscriberPanicked,
}

/// One published event.
#[derive(Clone, Debug)]
pub struct Event {
    /// Position in the process-wide event order.
    pub seq: u64,
    /// Wall-clock time of creation.
    pub at: SystemTime,
    pub kind: EventKind,
    /// Task id, or the subscriber name for subscriber diagnostics.
    pub task: Option<Arc<str>>,
    pub reason: Option<Arc<str>>,
    /// Size of the running set right after a pause/resume.
    pub running: Option<u32>,
}

impl Event {
    /// Stamps a new event of `kind`.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            running: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, id: impl Into<Arc<str>>) -> Self {
        self.task = Some(id.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, text: impl Into<Arc<str>>) -> Self {
        self.reason = Some(text.into());
        self
    }

    /// Running set size; saturates at `u32::MAX`.
    #[inline]
    pub fn with_running(mut self, n: usize) -> Self {
        self.running = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    pub(crate) fn subscriber_overflow(name: &'static str, why: &'static str) -> Self {
        Self::new(EventKind::SubscriberOverflow)
            .with_task(name)
            .with_reason(format!("subscriber={name} reason={why}"))
    }

    pub(crate) fn subscriber_panicked(name: &'static str, panic: String) -> Self {
        Self::new(EventKind::SubscriberPanicked)
            .with_task(name)
            .with_reason(panic)
    }

    /// True if the event carries `id` in its `task` field.
    pub fn is_for(&self, id: &str) -> bool {
        self.task.as_deref() == Some(id)
    }
}
