//! # LogWriter
//!
//! Renders manager events as `tracing` records under the `taskrank` target.
//! Handy in demos; real deployments usually write their own [`Subscribe`].
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO taskrank: started
//! INFO taskrank: resumed task="space-1" running=1
//! INFO taskrank: paused task="space-2" running=1
//! WARN taskrank: failed task="space-3" reason="context cancelled"
//! INFO taskrank: closed
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let running = e.running.unwrap_or_default();
        match e.kind {
            EventKind::ManagerStarted => info!(target: "taskrank", "started"),
            EventKind::ManagerClosed => info!(target: "taskrank", "closed"),
            EventKind::TaskAdded => info!(target: "taskrank", task, "added"),
            EventKind::TaskRejected => warn!(target: "taskrank", task, reason, "rejected"),
            EventKind::TaskResumed => info!(target: "taskrank", task, running, "resumed"),
            EventKind::TaskPaused => info!(target: "taskrank", task, running, "paused"),
            EventKind::TaskFinished => info!(target: "taskrank", task, "finished"),
            EventKind::TaskFailed => warn!(target: "taskrank", task, reason, "failed"),
            EventKind::PriorityUpdated => info!(target: "taskrank", source = reason, "priority updated"),
            EventKind::PriorityMismatch => warn!(target: "taskrank", reason, "priority mismatch"),
            EventKind::SubscriberOverflow => {
                warn!(target: "taskrank", subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "taskrank", subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
