//! # Per-task control state: pause gate, timing, terminal result.
//!
//! [`TaskState`] is owned by every [`Task`](crate::Task) and shared (cheap clone)
//! between the task body, the manager and any number of result observers.
//!
//! ## Pause gate
//! ```text
//!   armed ──resume()──► fired ──pause()──► armed (fresh) ──resume()──► fired ...
//!     ▲
//!  initial
//! ```
//! The gate is a [`CancellationToken`] kept in `Option`: `Some` is armed, `None`
//! means the last gate was fired (cancelled) and dropped. `wait_if_paused` clones
//! the gate that is current when it looks, then waits on that clone, so a waiter
//! released by `resume()` returns even if a fresh gate is armed right after.
//!
//! ## Timing
//! - `pause()` adds `now - last_resumed` to the work time.
//! - `resume()` sets `last_resumed = now`.
//! - `mark_done_with_error()` closes the running interval, if any.
//!
//! ## Rules
//! - The result is written once (first call wins), then `done` fires.
//! - After `done`, `pause()`/`resume()` are no-ops.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::result::TaskResult;

/// Shared control block of a single task.
#[derive(Clone)]
pub struct TaskState {
    inner: Arc<Inner>,
}

struct Inner {
    id: Arc<str>,
    /// Fired once, after `cell.result` is written.
    done: CancellationToken,
    cell: Mutex<Cell>,
}

struct Cell {
    gate: Option<CancellationToken>,
    last_resumed: Option<Instant>,
    work_time: Duration,
    start_time: Option<Instant>,
    result: Option<TaskResult>,
}

impl TaskState {
    /// Creates the state for a task with the given id. The task starts paused.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                done: CancellationToken::new(),
                cell: Mutex::new(Cell {
                    gate: Some(CancellationToken::new()),
                    last_resumed: None,
                    work_time: Duration::ZERO,
                    start_time: None,
                    result: None,
                }),
            }),
        }
    }

    /// Returns the stable task id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Cooperative checkpoint, called from inside [`Task::run`](crate::Task::run).
    ///
    /// - gate fired, context alive: returns `Ok(())` immediately;
    /// - gate armed: blocks until the gate fires (`Ok`) or `ctx` is cancelled
    ///   (`Err(TaskError::Canceled)`).
    ///
    /// Time spent blocked here is not counted as work time.
    pub async fn wait_if_paused(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let gate = self.inner.cell.lock().gate.clone();
        match gate {
            None if ctx.is_cancelled() => Err(TaskError::Canceled),
            None => Ok(()),
            Some(gate) => {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => Err(TaskError::Canceled),
                    _ = gate.cancelled() => Ok(()),
                }
            }
        }
    }

    /// Waits until the task reaches its terminal state or `ctx` is cancelled.
    ///
    /// Safe to call concurrently from any number of observers.
    pub async fn wait_result(&self, ctx: &CancellationToken) -> Result<TaskResult, TaskError> {
        loop {
            if let Some(result) = self.result() {
                return Ok(result);
            }
            tokio::select! {
                biased;
                _ = self.inner.done.cancelled() => {}
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
            }
        }
    }

    /// Non-blocking: the terminal result, if the task is done.
    pub fn result(&self) -> Option<TaskResult> {
        self.inner.cell.lock().result.clone()
    }

    /// True once the terminal result is published.
    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// True while the pause gate is armed.
    pub fn is_paused(&self) -> bool {
        self.inner.cell.lock().gate.is_some()
    }

    /// True if both handles belong to the same task instance.
    pub(crate) fn ptr_eq(&self, other: &TaskState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Arms a fresh gate if the task is running. Returns `true` on a state change.
    pub(crate) fn pause(&self) -> bool {
        let mut cell = self.inner.cell.lock();
        if cell.result.is_some() || cell.gate.is_some() {
            return false;
        }
        cell.gate = Some(CancellationToken::new());
        if let Some(at) = cell.last_resumed.take() {
            cell.work_time += Instant::now().saturating_duration_since(at);
        }
        true
    }

    /// Fires the current gate if the task is paused. Returns `true` on a state change.
    pub(crate) fn resume(&self) -> bool {
        let mut cell = self.inner.cell.lock();
        if cell.result.is_some() {
            return false;
        }
        let Some(gate) = cell.gate.take() else {
            return false;
        };
        gate.cancel();
        cell.last_resumed = Some(Instant::now());
        true
    }

    /// Records the dispatch instant; later calls keep the first value.
    pub(crate) fn set_start_time(&self, at: Instant) {
        let mut cell = self.inner.cell.lock();
        if cell.start_time.is_none() {
            cell.start_time = Some(at);
        }
    }

    /// Publishes the terminal result and fires `done`.
    ///
    /// First call wins; returns `false` if the task was already terminal.
    pub(crate) fn mark_done_with_error(&self, error: Option<TaskError>) -> bool {
        {
            let mut cell = self.inner.cell.lock();
            if cell.result.is_some() {
                return false;
            }
            let now = Instant::now();
            if cell.gate.is_none() {
                if let Some(at) = cell.last_resumed.take() {
                    cell.work_time += now.saturating_duration_since(at);
                }
            }
            cell.result = Some(TaskResult {
                error,
                start_time: cell.start_time.unwrap_or(now),
                finish_time: now,
                work_time: cell.work_time,
            });
        }
        self.inner.done.cancel();
        true
    }
}

impl std::fmt::Debug for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskState")
            .field("id", &self.inner.id)
            .field("paused", &self.is_paused())
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::poll;
    use std::task::Poll;

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn test_initially_paused_blocks() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();
        assert!(st.is_paused());

        let waited = tokio::time::timeout(50 * MS, st.wait_if_paused(&ctx)).await;
        assert!(waited.is_err(), "first checkpoint must block until resumed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_releases_waiter() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();

        let waiter = {
            let st = st.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { st.wait_if_paused(&ctx).await })
        };
        tokio::task::yield_now().await;
        assert!(st.resume());
        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert_eq!(st.wait_if_paused(&ctx).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_paused_is_canceled() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(st.wait_if_paused(&ctx).await, Err(TaskError::Canceled));

        st.resume();
        assert_eq!(st.wait_if_paused(&ctx).await, Err(TaskError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_observes_gate_current_at_look() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();

        let fut = st.wait_if_paused(&ctx);
        tokio::pin!(fut);
        assert!(matches!(poll!(&mut fut), Poll::Pending));

        // Fire the observed gate, then immediately arm a fresh one.
        assert!(st.resume());
        assert!(st.pause());
        assert_eq!(fut.await, Ok(()));

        // A new checkpoint sees the fresh gate.
        let again = tokio::time::timeout(10 * MS, st.wait_if_paused(&ctx)).await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_idempotent() {
        let st = TaskState::new("t");
        assert!(!st.pause());
        assert!(st.resume());
        assert!(!st.resume());
        assert!(st.pause());
        assert!(!st.pause());
        assert!(st.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_time_counts_only_resumed_intervals() {
        let st = TaskState::new("t");
        st.set_start_time(Instant::now());

        tokio::time::advance(20 * MS).await;
        st.pause();
        st.resume();
        tokio::time::advance(10 * MS).await;
        st.pause();
        tokio::time::advance(30 * MS).await;
        st.resume();
        tokio::time::advance(5 * MS).await;
        assert!(st.mark_done_with_error(None));

        let res = st.result().unwrap();
        assert_eq!(res.work_time, 15 * MS);
        assert_eq!(res.elapsed(), 65 * MS);
        assert!(res.work_time < res.elapsed());
        assert!(res.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_done_first_call_wins() {
        let st = TaskState::new("t");
        st.set_start_time(Instant::now());
        assert!(st.mark_done_with_error(Some(TaskError::fail("first"))));
        let first = st.result().unwrap();

        tokio::time::advance(10 * MS).await;
        assert!(!st.mark_done_with_error(None));
        assert_eq!(st.result().unwrap(), first);
        assert!(st.is_done());
        assert!(!st.resume(), "resume after done is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_result_many_observers() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();

        let observers: Vec<_> = (0..3)
            .map(|_| {
                let st = st.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { st.wait_result(&ctx).await })
            })
            .collect();

        tokio::time::sleep(5 * MS).await;
        st.mark_done_with_error(Some(TaskError::Canceled));

        for o in observers {
            let res = o.await.unwrap().unwrap();
            assert_eq!(res.error, Some(TaskError::Canceled));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_result_ctx_cancelled() {
        let st = TaskState::new("t");
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(st.wait_result(&ctx).await, Err(TaskError::Canceled));
        assert!(st.result().is_none());
    }
}
