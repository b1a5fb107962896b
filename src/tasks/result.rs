use std::time::Duration;

use tokio::time::Instant;

use crate::error::TaskError;

/// Terminal outcome of a task, written exactly once.
///
/// `work_time` covers only the intervals the task spent resumed, so
/// `work_time <= finish_time - start_time` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// `None` on success.
    pub error: Option<TaskError>,
    /// Dispatch instant (set by the manager right before the task is spawned).
    pub start_time: Instant,
    /// Instant the result was published.
    pub finish_time: Instant,
    /// Accumulated time spent in the resumed state.
    pub work_time: Duration,
}

impl TaskResult {
    /// True if the task finished without an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Wall-clock time between dispatch and completion.
    pub fn elapsed(&self) -> Duration {
        self.finish_time.saturating_duration_since(self.start_time)
    }

    /// Time spent paused (or waiting for the first resume).
    pub fn paused_time(&self) -> Duration {
        self.elapsed().saturating_sub(self.work_time)
    }
}
