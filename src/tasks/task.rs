//! # Task abstraction.
//!
//! A [`Task`] is a long-running, cooperatively pausable unit of work. It owns a
//! [`TaskState`] (pause gate, timing, terminal result) and exposes an async
//! [`run`](Task::run) entry point invoked exactly once by the
//! [`Manager`](crate::Manager).
//!
//! The body must call [`TaskState::wait_if_paused`] at every cooperative
//! checkpoint. The task starts paused, so its first checkpoint blocks until the
//! manager resumes it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::state::TaskState;

/// # Cooperatively pausable unit of work.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use taskrank::{Task, TaskError, TaskState};
///
/// struct Reindex {
///     state: TaskState,
///     ids: Vec<String>,
/// }
///
/// #[async_trait]
/// impl Task for Reindex {
///     fn state(&self) -> &TaskState { &self.state }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         for _id in &self.ids {
///             self.state.wait_if_paused(&ctx).await?;
///             // index one object...
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Control block shared with the manager.
    fn state(&self) -> &TaskState;

    /// Executes the workload.
    ///
    /// Called at most once. The returned error (including
    /// [`TaskError::Canceled`]) becomes the task's terminal result; the manager
    /// publishes it, not the body.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;

    /// Stable identifier, unique among the live tasks of a manager.
    fn id(&self) -> &str {
        self.state().id()
    }
}

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;
