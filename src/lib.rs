//! # taskrank
//!
//! **Taskrank** runs a set of cooperative async tasks under a concurrency cap,
//! choosing which ones run from a caller-supplied priority list.
//!
//! Every submitted task is dispatched immediately but starts *paused*: its body
//! blocks at the first checkpoint. The manager keeps the top `max_concurrent`
//! live tasks of the priority list resumed and pauses everything else in place.
//! Changing the list, adding a task or finishing one re-runs the reconciliation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Task      │   │    Task      │   │    Task      │
//!     │ (space-1)    │   │ (space-2)    │   │ (space-3)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ add_task         ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Manager                                                          │
//! │  - lifecycle mutex (pre-start buffer, phase)                      │
//! │  - commands mailbox ──► Coordinator (single event loop)           │
//! │  - outstanding counter (backs wait_and_close)                     │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼ resume           ▼ pause            ▼ pause         │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ TaskWrapper  │   │ TaskWrapper  │   │ TaskWrapper  │   │
//!     │ run → done   │   │ (blocked at  │   │ (blocked at  │   │
//!     │ → finished   │   │  checkpoint) │   │  checkpoint) │   │
//!     └──────────────┘   └──────────────┘   └──────────────┘   │
//!                                                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                 (capacity: ManagerConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           ┌───────┼───────┐
//!                           ▼       ▼       ▼
//!                        worker1 worker2 workerN
//! ```
//!
//! ### Reconciliation
//! ```text
//! desired = first max_concurrent distinct ids of the priority list
//!           that name a live (not done) task
//!
//! for id in running \ desired  ─► pause()   publish TaskPaused
//! for id in desired \ running  ─► resume()  publish TaskResumed
//! ```
//! Pauses are applied before resumes, so the cap holds at every step.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits               |
//! |-------------------|--------------------------------------------------------------|----------------------------------|
//! | **Tasks**         | Cooperative tasks with a pause gate and timing accounting.   | [`Task`], [`TaskFn`], [`TaskState`] |
//! | **Manager**       | Priority-driven pause/resume under a concurrency cap.        | [`Manager`], [`ManagerBuilder`]  |
//! | **Priority**      | Explicit lists or sorter-computed ranking.                   | [`PrioritySorter`], [`rank_by`]  |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).         | [`Subscribe`], [`Event`]         |
//! | **Errors**        | Typed terminal errors of tasks.                              | [`TaskError`]                    |
//! | **Configuration** | Cap, bus capacity and name.                                  | [`ManagerConfig`]                |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskrank::{Checkpoint, Manager, ManagerConfig, TaskError, TaskFn, TaskRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn taskrank::Subscribe>> = vec![Arc::new(taskrank::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn taskrank::Subscribe>> = Vec::new();
//!
//!     let manager = Manager::builder(ManagerConfig::with_max_concurrent(2))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let spaces: Vec<TaskRef> = ["s1", "s2", "s3"]
//!         .into_iter()
//!         .map(|id| -> TaskRef {
//!             TaskFn::arc(id, |cp: Checkpoint| async move {
//!                 for _ in 0..2 {
//!                     cp.wait().await?;
//!                     tokio::time::sleep(Duration::from_millis(1)).await;
//!                 }
//!                 Ok::<_, TaskError>(())
//!             })
//!         })
//!         .collect();
//!     for t in &spaces {
//!         manager.add_task(t.clone());
//!     }
//!     manager.update_priority(vec!["s3".into(), "s1".into(), "s2".into()]);
//!
//!     let runner = manager.clone();
//!     let run = tokio::spawn(async move { runner.run(CancellationToken::new()).await });
//!     manager.wait_and_close().await;
//!     run.await.unwrap();
//!
//!     for t in &spaces {
//!         assert!(t.state().result().unwrap().is_ok());
//!     }
//! }
//! ```
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{Manager, ManagerBuilder, ManagerConfig, PrioritySorter, rank_by};
pub use error::TaskError;
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Checkpoint, Task, TaskFn, TaskRef, TaskResult, TaskState};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
