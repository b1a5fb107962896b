//! # Manager: priority-driven pause/resume of cooperative tasks.
//!
//! The [`Manager`] keeps at most `max_concurrent` tasks resumed: the live tasks
//! that rank highest in the priority list. Everything else stays dispatched but
//! blocked at its next checkpoint.
//!
//! ## Lifecycle
//! ```text
//!   pre-start ──run()──► running ──wait_and_close() drains──► closed
//!       │                                                       ▲
//!       └──────────── wait_and_close() with nothing added ──────┘
//! ```
//! - *pre-start*: `add_task` buffers, `update_priority` overwrites the list; nothing runs.
//! - *running*: every mutation is a message to the coordinator loop.
//! - *closed*: `add_task`, `update_priority` and `refresh_priority` panic.
//!
//! ## Architecture
//! ```text
//!  add_task ──────────┐
//!  update_priority ───┼──► commands ──► Coordinator ──► TaskState::pause/resume
//!  refresh_priority ──┘                    ▲    │
//!                    TaskWrapper ─finished─┘    └──► Bus ──► listener ──► SubscriberSet
//!
//!  outstanding (watch<usize>): +1 on add, -1 after the finish is reconciled
//!  wait_and_close: waits for 0, then fires `closed`
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskrank::{Checkpoint, Manager, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let manager = Manager::new(1);
//!
//!     for id in ["low", "high"] {
//!         manager.add_task(TaskFn::arc(id, |cp: Checkpoint| async move {
//!             for _ in 0..3 {
//!                 cp.wait().await?;
//!                 tokio::time::sleep(Duration::from_millis(1)).await;
//!             }
//!             Ok::<_, TaskError>(())
//!         }));
//!     }
//!     manager.update_priority(vec!["high".into(), "low".into()]);
//!
//!     let runner = manager.clone();
//!     let run = tokio::spawn(async move { runner.run(CancellationToken::new()).await });
//!
//!     manager.wait_and_close().await;
//!     run.await.unwrap();
//!     assert!(manager.is_closed());
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::builder::ManagerBuilder;
use crate::core::config::ManagerConfig;
use crate::core::coordinator::{Command, Coordinator, Links};
use crate::core::sorter::PrioritySorter;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    PreStart,
    Running,
    Closed,
}

/// State guarded by the lifecycle mutex.
///
/// Outside *pre-start* only `phase` and `close_requested` are read; the rest is
/// handed to the coordinator by `run`.
struct Lifecycle {
    phase: Phase,
    close_requested: bool,
    pending: Vec<TaskRef>,
    priority: Vec<String>,
    commands: Option<mpsc::UnboundedReceiver<Command>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Coordinates a set of cooperative tasks under a concurrency cap.
///
/// Shared as `Arc<Manager>`: one handle drives [`run`](Self::run), others add
/// tasks, update the priority and close.
pub struct Manager {
    cfg: ManagerConfig,
    sorter: Option<PrioritySorter>,
    bus: Bus,
    lifecycle: Mutex<Lifecycle>,
    commands: mpsc::UnboundedSender<Command>,
    /// Submitted but not yet drained tasks.
    outstanding: watch::Sender<usize>,
    started: CancellationToken,
    closed: CancellationToken,
}

impl Manager {
    /// Creates a manager with the given cap and default configuration.
    ///
    /// `max_concurrent = 0` is treated as 1.
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        ManagerBuilder::new(ManagerConfig::with_max_concurrent(max_concurrent)).build()
    }

    /// Returns a builder for a manager with a sorter and/or subscribers.
    pub fn builder(cfg: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: ManagerConfig,
        sorter: Option<PrioritySorter>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        Self {
            cfg,
            sorter,
            bus,
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::PreStart,
                close_requested: false,
                pending: Vec::new(),
                priority: Vec::new(),
                commands: Some(commands_rx),
                subscribers,
            }),
            commands,
            outstanding,
            started: CancellationToken::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Submits a task.
    ///
    /// - *pre-start*: buffered; dispatched when `run` starts.
    /// - *running*: handed to the coordinator, dispatched paused, then reconciled.
    ///
    /// A task whose id belongs to another live task is rejected: it completes with
    /// [`TaskError::DuplicateId`] and never runs. Adding the same instance twice
    /// is ignored, and so is an instance that is already done (finished or
    /// rejected): a task body runs at most once.
    ///
    /// # Panics
    /// If the manager is closed.
    pub fn add_task(&self, task: TaskRef) {
        let mut lc = self.lifecycle.lock();
        match lc.phase {
            Phase::Closed => {
                panic!("taskrank: add_task({:?}) on a closed manager", task.id())
            }
            Phase::PreStart | Phase::Running if task.state().is_done() => {
                debug!(manager = %self.cfg.name, task = task.id(), "task already done; ignoring");
            }
            Phase::PreStart => {
                if let Some(existing) = lc.pending.iter().find(|t| t.id() == task.id()) {
                    if existing.state().ptr_eq(task.state()) {
                        debug!(manager = %self.cfg.name, task = task.id(), "task added twice; ignoring");
                    } else {
                        self.reject_duplicate(&task);
                    }
                    return;
                }
                debug!(manager = %self.cfg.name, task = task.id(), "task buffered");
                lc.pending.push(task);
                self.outstanding.send_modify(|n| *n += 1);
            }
            Phase::Running => {
                self.outstanding.send_modify(|n| *n += 1);
                if let Err(mpsc::error::SendError(cmd)) = self.commands.send(Command::Add(task)) {
                    // The run future was dropped; nothing will ever drain this task.
                    if let Command::Add(task) = cmd {
                        warn!(manager = %self.cfg.name, task = task.id(), "coordinator gone; cancelling task");
                        task.state().mark_done_with_error(Some(TaskError::Canceled));
                    }
                    self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
                }
            }
        }
    }

    /// Replaces the priority list (highest priority first).
    ///
    /// The list is taken as-is: ids without a live task are skipped, duplicate
    /// ids count once (first occurrence), live tasks missing from the list never
    /// run.
    ///
    /// # Panics
    /// If the manager is closed.
    pub fn update_priority(&self, list: Vec<String>) {
        let mut lc = self.lifecycle.lock();
        match lc.phase {
            Phase::Closed => panic!("taskrank: update_priority on a closed manager"),
            Phase::PreStart => {
                lc.priority = list;
                self.bus
                    .publish(Event::new(EventKind::PriorityUpdated).with_reason("update"));
            }
            Phase::Running => self.send(Command::UpdatePriority(list)),
        }
    }

    /// Recomputes the priority list with the configured sorter.
    ///
    /// No-op without a sorter.
    ///
    /// # Panics
    /// If the manager is closed.
    pub fn refresh_priority(&self) {
        let mut lc = self.lifecycle.lock();
        match lc.phase {
            Phase::Closed => panic!("taskrank: refresh_priority on a closed manager"),
            Phase::PreStart => {
                let Some(sorter) = &self.sorter else {
                    debug!(manager = %self.cfg.name, "refresh requested without a sorter");
                    return;
                };
                let mut ids: Vec<String> = lc.pending.iter().map(|t| t.id().to_string()).collect();
                ids.sort_unstable();
                lc.priority = sorter(ids.as_slice());
                self.bus
                    .publish(Event::new(EventKind::PriorityUpdated).with_reason("refresh"));
            }
            Phase::Running => self.send(Command::RefreshPriority),
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            warn!(manager = %self.cfg.name, "coordinator gone; command dropped");
        }
    }

    fn reject_duplicate(&self, task: &TaskRef) {
        let err = TaskError::DuplicateId {
            id: task.id().to_string(),
        };
        debug!(manager = %self.cfg.name, task = task.id(), "duplicate id rejected");
        self.bus.publish(
            Event::new(EventKind::TaskRejected)
                .with_task(task.id())
                .with_reason(err.as_label()),
        );
        task.state().mark_done_with_error(Some(err));
    }

    /// Dispatches the buffered tasks, fires `started` and runs the coordinator
    /// until the manager is closed.
    ///
    /// Every task gets a child of `ctx`: cancelling it cancels all live tasks,
    /// which then finish with [`TaskError::Canceled`] and drain normally.
    ///
    /// Returns immediately if the manager is already running or closed.
    pub async fn run(&self, ctx: CancellationToken) {
        let (pending, priority, commands, listener) = {
            let mut lc = self.lifecycle.lock();
            if lc.phase != Phase::PreStart {
                debug!(manager = %self.cfg.name, phase = ?lc.phase, "run ignored");
                return;
            }
            let Some(commands) = lc.commands.take() else {
                return;
            };
            lc.phase = Phase::Running;
            // Subscribed under the lock: `try_close` cannot publish `ManagerClosed` before it.
            let listener = self.subscriber_listener(std::mem::take(&mut lc.subscribers));
            (
                std::mem::take(&mut lc.pending),
                std::mem::take(&mut lc.priority),
                commands,
                listener,
            )
        };

        let links = Links {
            name: &self.cfg.name,
            bus: &self.bus,
            outstanding: &self.outstanding,
            started: &self.started,
            closed: &self.closed,
            sorter: self.sorter.as_ref(),
        };
        Coordinator::new(links, self.cfg.max_concurrent_clamped(), ctx, priority)
            .run(pending, commands)
            .await;

        if let Some(listener) = listener {
            let _ = listener.await;
        }
    }

    /// Forwards bus events to the subscribers until `ManagerClosed`.
    fn subscriber_listener(&self, subscribers: Vec<Arc<dyn Subscribe>>) -> Option<JoinHandle<()>> {
        if subscribers.is_empty() {
            return None;
        }
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(subscribers, self.bus.clone());
        Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let last = ev.kind == EventKind::ManagerClosed;
                        set.emit(ev);
                        if last {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        }))
    }

    /// Waits until every submitted task has finished, then closes the manager.
    ///
    /// Legal before `run`: returns at once if nothing was added.
    ///
    /// # Panics
    /// If called more than once.
    pub async fn wait_and_close(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.close_requested {
                panic!("taskrank: wait_and_close called twice");
            }
            lc.close_requested = true;
        }

        let mut rx = self.outstanding.subscribe();
        loop {
            let _ = rx.wait_for(|n| *n == 0).await;
            if self.try_close() {
                break;
            }
        }

        self.closed.cancel();
        debug!(manager = %self.cfg.name, "closed");
        self.bus.publish(Event::new(EventKind::ManagerClosed));
    }

    /// Moves to *closed* if nothing is outstanding. An add may slip in between the
    /// drain and the lock, hence the re-check.
    fn try_close(&self) -> bool {
        let mut lc = self.lifecycle.lock();
        if *self.outstanding.borrow() != 0 {
            return false;
        }
        lc.phase = Phase::Closed;
        true
    }

    /// Resolves once `run` has dispatched the buffered tasks.
    pub async fn wait_started(&self) {
        self.started.cancelled().await;
    }

    /// True once `wait_and_close` has completed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of submitted tasks not yet drained.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Receiver for the runtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration this manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.cfg
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.cfg.name)
            .field("max_concurrent", &self.cfg.max_concurrent_clamped())
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish()
    }
}
