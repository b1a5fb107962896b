#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taskrank::{Event, EventKind, Manager, Task, TaskError, TaskRef, TaskResult, TaskState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const STEP: Duration = Duration::from_millis(10);

/// Task doing `iterations` steps of [`STEP`], with a checkpoint before each.
pub struct IterTask {
    state: TaskState,
    iterations: usize,
    done_steps: AtomicUsize,
}

impl IterTask {
    pub fn new(id: &str, iterations: usize) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(id),
            iterations,
            done_steps: AtomicUsize::new(0),
        })
    }

    /// Steps completed so far.
    pub fn progress(&self) -> usize {
        self.done_steps.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> TaskResult {
        self.state.result().expect("task is not done")
    }
}

#[async_trait]
impl Task for IterTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        for _ in 0..self.iterations {
            self.state.wait_if_paused(&ctx).await?;
            tokio::time::sleep(STEP).await;
            self.done_steps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Task panicking at its first resumed checkpoint.
pub struct PanicTask {
    state: TaskState,
}

impl PanicTask {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(id),
        })
    }
}

#[async_trait]
impl Task for PanicTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.state.wait_if_paused(&ctx).await?;
        panic!("index corrupted");
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn task_ref(task: &Arc<IterTask>) -> TaskRef {
    task.clone()
}

/// Spawns `manager.run(ctx)` on the current runtime.
pub fn spawn_run(manager: &Arc<Manager>, ctx: CancellationToken) -> JoinHandle<()> {
    let manager = manager.clone();
    tokio::spawn(async move { manager.run(ctx).await })
}

/// Drains every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Position of the first event of `kind` for `task`.
pub fn position(events: &[Event], kind: EventKind, task: &str) -> Option<usize> {
    events.iter().position(|e| e.kind == kind && e.is_for(task))
}

/// Samples the resumed, not-done tasks every millisecond and returns the peak.
pub fn spawn_sampler(tasks: Vec<TaskRef>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut peak = 0;
        loop {
            let live: Vec<_> = tasks.iter().filter(|t| !t.state().is_done()).collect();
            if live.is_empty() {
                return peak;
            }
            let resumed = live.iter().filter(|t| !t.state().is_paused()).count();
            peak = peak.max(resumed);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
}
