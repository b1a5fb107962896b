//! # Dispatch adapter around a submitted task.
//!
//! ```text
//! TaskWrapper::dispatch()
//!   ├─► set_start_time(now)
//!   └─► spawn:
//!         task.run(ctx)            (blocks at first checkpoint: gate armed)
//!           │
//!           ├─ Ok / Err(e) / panic
//!           ▼
//!         mark_done_with_error()   (publishes result, fires `done`)
//!           ▼
//!         finished_tx.send(..)     (coordinator reconciles, decrements outstanding)
//! ```
//!
//! ## Rules
//! - `done` fires strictly before the finished message is sent.
//! - A panicking body is recorded as [`TaskError::Panicked`].

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{TaskRef, TaskState};

/// Message sent on the finished channel.
pub(crate) struct Finished {
    pub id: String,
    /// Identifies the exact task instance (ids of finished tasks may be reused).
    pub state: TaskState,
}

pub(crate) struct TaskWrapper {
    task: TaskRef,
    finished: mpsc::UnboundedSender<Finished>,
}

impl TaskWrapper {
    pub(crate) fn new(task: TaskRef, finished: mpsc::UnboundedSender<Finished>) -> Self {
        Self { task, finished }
    }

    /// Stamps the start time and spawns the task body.
    pub(crate) fn dispatch(self, ctx: CancellationToken) {
        self.task.state().set_start_time(Instant::now());
        tokio::spawn(self.run(ctx));
    }

    async fn run(self, ctx: CancellationToken) {
        let error = match AssertUnwindSafe(self.task.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(TaskError::from_panic(&*payload)),
        };

        let state = self.task.state().clone();
        state.mark_done_with_error(error);
        let _ = self.finished.send(Finished {
            id: state.id().to_string(),
            state,
        });
    }
}
