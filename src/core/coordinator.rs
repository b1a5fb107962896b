//! # Coordinator: the single reconciliation loop.
//!
//! Owns the running-state bookkeeping (`tasks`, `priority`, `running`) and is the
//! only code that mutates it while the manager runs.
//!
//! ## Event flow
//! ```text
//!            ┌──────────── Command::Add(task) ───────────────┐
//!  Manager ──┼──────────── Command::UpdatePriority(list) ────┼──► commands (mpsc)
//!            └──────────── Command::RefreshPriority ─────────┘         │
//!                                                                      ▼
//!  TaskWrapper ─── Finished{id} ──► finished (mpsc) ──────────► Coordinator::run()
//!                                                                      │
//!                                              each event: mutate → reconcile()
//!                                                                      │
//!                                         pause() / resume() ◄─────────┘
//!                                         Bus: TaskPaused / TaskResumed / ...
//! ```
//!
//! ## Rules
//! - Events are processed strictly one at a time; reconciliation completes
//!   before the next event is consumed.
//! - A finished event removes the task, reconciles (promoting a paused task into
//!   the freed slot), and only then decrements the outstanding counter.
//! - The loop exits when `closed` fires.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::reconcile::{desired_running_set, plan};
use crate::core::sorter::PrioritySorter;
use crate::core::wrapper::{Finished, TaskWrapper};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskRef;

/// Messages accepted by the coordinator mailbox.
pub(crate) enum Command {
    Add(TaskRef),
    UpdatePriority(Vec<String>),
    RefreshPriority,
}

/// Shared handles the coordinator borrows from its manager.
pub(crate) struct Links<'a> {
    pub name: &'a str,
    pub bus: &'a Bus,
    pub outstanding: &'a watch::Sender<usize>,
    pub started: &'a CancellationToken,
    pub closed: &'a CancellationToken,
    pub sorter: Option<&'a PrioritySorter>,
}

pub(crate) struct Coordinator<'a> {
    links: Links<'a>,
    max_concurrent: usize,
    ctx: CancellationToken,

    tasks: HashMap<String, TaskRef>,
    priority: Vec<String>,
    /// Ids currently resumed, in resume order.
    running: Vec<String>,
    /// Last reported (priority len, task count) mismatch.
    mismatch: Option<(usize, usize)>,

    finished_tx: mpsc::UnboundedSender<Finished>,
    finished_rx: mpsc::UnboundedReceiver<Finished>,
}

impl<'a> Coordinator<'a> {
    pub(crate) fn new(
        links: Links<'a>,
        max_concurrent: usize,
        ctx: CancellationToken,
        priority: Vec<String>,
    ) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            links,
            max_concurrent,
            ctx,
            tasks: HashMap::new(),
            priority,
            running: Vec::new(),
            mismatch: None,
            finished_tx,
            finished_rx,
        }
    }

    /// Dispatches the pre-added tasks, fires `started`, then processes events
    /// until `closed` fires.
    pub(crate) async fn run(
        mut self,
        pending: Vec<TaskRef>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        for task in pending {
            self.accept(task);
        }
        if self.links.sorter.is_some() {
            self.refresh();
        }
        self.links.started.cancel();
        self.links.bus.publish(Event::new(EventKind::ManagerStarted));
        if self.links.sorter.is_none() && !self.priority.is_empty() {
            self.links
                .bus
                .publish(Event::new(EventKind::PriorityUpdated).with_reason("run"));
        }
        self.reconcile();
        debug!(manager = self.links.name, tasks = self.tasks.len(), running = self.running.len(), "started");

        let closed = self.links.closed;
        loop {
            tokio::select! {
                biased;
                _ = closed.cancelled() => break,
                Some(done) = self.finished_rx.recv() => self.on_finished(done),
                Some(cmd) = commands.recv() => self.on_command(cmd),
                else => break,
            }
        }
        debug!(manager = self.links.name, "coordinator stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Add(task) => {
                if !self.admit(task) {
                    return;
                }
                if self.links.sorter.is_some() {
                    self.refresh();
                }
            }
            Command::UpdatePriority(list) => {
                self.priority = list;
                self.links
                    .bus
                    .publish(Event::new(EventKind::PriorityUpdated).with_reason("update"));
            }
            Command::RefreshPriority => {
                if self.links.sorter.is_none() {
                    debug!(manager = self.links.name, "refresh requested without a sorter");
                    return;
                }
                self.refresh();
            }
        }
        self.reconcile();
    }

    /// Registers a task submitted while running; `false` if it was refused.
    fn admit(&mut self, task: TaskRef) -> bool {
        let id = task.id().to_string();
        if task.state().is_done() {
            debug!(manager = self.links.name, task = %id, "task already done; ignoring");
            self.release_one();
            return false;
        }
        if let Some(existing) = self.tasks.get(&id) {
            if existing.state().ptr_eq(task.state()) {
                debug!(manager = self.links.name, task = %id, "task added twice; ignoring");
                self.release_one();
                return false;
            }
            if !existing.state().is_done() {
                let err = TaskError::DuplicateId { id: id.clone() };
                self.links.bus.publish(
                    Event::new(EventKind::TaskRejected)
                        .with_task(id)
                        .with_reason(err.as_label()),
                );
                task.state().mark_done_with_error(Some(err));
                self.release_one();
                return false;
            }
            // Previous holder of the id is done; its finished message is still queued.
            self.running.retain(|r| r != &id);
        }
        self.accept(task);
        true
    }

    /// Inserts and dispatches a task in the paused state.
    fn accept(&mut self, task: TaskRef) {
        let id = task.id().to_string();
        TaskWrapper::new(task.clone(), self.finished_tx.clone()).dispatch(self.ctx.child_token());
        self.tasks.insert(id.clone(), task);
        debug!(manager = self.links.name, task = %id, "task dispatched (paused)");
        self.links
            .bus
            .publish(Event::new(EventKind::TaskAdded).with_task(id));
    }

    fn on_finished(&mut self, done: Finished) {
        let current = self
            .tasks
            .get(&done.id)
            .is_some_and(|t| t.state().ptr_eq(&done.state));
        if current {
            self.tasks.remove(&done.id);
            self.running.retain(|r| r != &done.id);
        }

        let error = done.state.result().and_then(|r| r.error);
        match &error {
            None => {
                debug!(manager = self.links.name, task = %done.id, "task finished");
                self.links
                    .bus
                    .publish(Event::new(EventKind::TaskFinished).with_task(done.id));
            }
            Some(e) => {
                debug!(manager = self.links.name, task = %done.id, error = %e, "task failed");
                self.links.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(done.id)
                        .with_reason(e.to_string()),
                );
            }
        }

        self.reconcile();
        self.release_one();
    }

    fn release_one(&self) {
        self.links
            .outstanding
            .send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Recomputes the priority list from the sorter over the live ids.
    fn refresh(&mut self) {
        let Some(sorter) = self.links.sorter else {
            return;
        };
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort_unstable();
        self.priority = sorter(ids.as_slice());
        self.links
            .bus
            .publish(Event::new(EventKind::PriorityUpdated).with_reason("refresh"));
    }

    /// Makes the running set equal to the desired running set.
    fn reconcile(&mut self) {
        self.check_mismatch();

        let tasks = &self.tasks;
        let desired = desired_running_set(
            &self.priority,
            |id| tasks.get(id).is_some_and(|t| !t.state().is_done()),
            self.max_concurrent,
        );
        let plan = plan(&desired, &self.running);
        if plan.is_empty() {
            return;
        }

        for id in plan.pause {
            self.running.retain(|r| r != &id);
            if let Some(task) = self.tasks.get(&id) {
                task.state().pause();
            }
            debug!(manager = self.links.name, task = %id, running = self.running.len(), "paused");
            self.links.bus.publish(
                Event::new(EventKind::TaskPaused)
                    .with_task(id)
                    .with_running(self.running.len()),
            );
        }
        for id in plan.resume {
            if let Some(task) = self.tasks.get(&id) {
                task.state().resume();
            }
            self.running.push(id.clone());
            debug!(manager = self.links.name, task = %id, running = self.running.len(), "resumed");
            self.links.bus.publish(
                Event::new(EventKind::TaskResumed)
                    .with_task(id)
                    .with_running(self.running.len()),
            );
        }
    }

    /// Reports a size mismatch between the priority list and the task set, once per change.
    fn check_mismatch(&mut self) {
        let sizes = (self.priority.len(), self.tasks.len());
        if sizes.0 == sizes.1 {
            self.mismatch = None;
            return;
        }
        if self.mismatch == Some(sizes) {
            return;
        }
        self.mismatch = Some(sizes);
        warn!(
            manager = self.links.name,
            priority = sizes.0,
            tasks = sizes.1,
            "priority list does not match the task set"
        );
        self.links.bus.publish(
            Event::new(EventKind::PriorityMismatch)
                .with_reason(format!("priority={} tasks={}", sizes.0, sizes.1)),
        );
    }
}
