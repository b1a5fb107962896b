//! # Task abstractions.
//!
//! This module provides the task-side types:
//! - [`Task`] - trait for cooperatively pausable async tasks
//! - [`TaskState`] - pause gate, timing counters and terminal result of one task
//! - [`TaskResult`] - the terminal result snapshot
//! - [`TaskFn`] / [`Checkpoint`] - closure-backed task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)

mod result;
mod state;
mod task;
mod task_fn;

pub use result::TaskResult;
pub use state::TaskState;
pub use task::{Task, TaskRef};
pub use task_fn::{Checkpoint, TaskFn};
