//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(Checkpoint) -> Fut`. The [`Checkpoint`] bundles
//! the task's cancellation token with its [`TaskState`], so the closure can yield
//! with `cp.wait().await?` without holding a reference to the task itself.
//!
//! ## Example
//! ```rust
//! use taskrank::{Checkpoint, Task, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("reindex-space-1", |cp: Checkpoint| async move {
//!     for _ in 0..3 {
//!         cp.wait().await?;
//!         // do one unit of work...
//!     }
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.id(), "reindex-space-1");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::state::TaskState;
use crate::tasks::task::Task;

/// Cooperative checkpoint handed to a [`TaskFn`] closure.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    ctx: CancellationToken,
    state: TaskState,
}

impl Checkpoint {
    /// Blocks while the task is paused; fails with [`TaskError::Canceled`] on cancellation.
    pub async fn wait(&self) -> Result<(), TaskError> {
        self.state.wait_if_paused(&self.ctx).await
    }

    /// The task's cancellation token (child of the manager context).
    pub fn token(&self) -> &CancellationToken {
        &self.ctx
    }

    /// True once the manager context (or this task's token) is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }

    /// Id of the task this checkpoint belongs to.
    pub fn id(&self) -> &str {
        self.state.id()
    }
}

/// Function-backed task implementation.
pub struct TaskFn<F> {
    state: TaskState,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(id: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            state: TaskState::new(id),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(id: impl Into<Arc<str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(id, f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(Checkpoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let cp = Checkpoint {
            ctx,
            state: self.state.clone(),
        };
        (self.f)(cp).await
    }
}
