//! Error types produced by task executions.
//!
//! The manager itself has no error returns: its operations either succeed or
//! panic on caller misuse. Everything that can go wrong at runtime belongs to a
//! specific task and is recorded once in that task's [`TaskResult`](crate::TaskResult).
//!
//! [`TaskError`] provides `as_label` for logs/metrics and [`TaskError::is_canceled`]
//! to tell cancellation apart from genuine failures.

use std::any::Any;

use thiserror::Error;

/// # Errors produced by task execution.
///
/// Stored in [`TaskResult::error`](crate::TaskResult::error) and handed out to any
/// number of observers, hence `Clone`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Context cancelled; observed at a checkpoint or by a context-aware operation.
    #[error("context cancelled")]
    Canceled,

    /// Task body returned a failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task body panicked; the panic was caught by the manager.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Another live task with the same id was already registered.
    #[error("task id {id:?} is already registered")]
    DuplicateId {
        /// The conflicting id.
        id: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskrank::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::DuplicateId { .. } => "task_duplicate_id",
        }
    }

    /// Builds [`TaskError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        TaskError::Panicked {
            info: panic_message(payload),
        }
    }

    /// True when the error originates from context cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// Renders a panic payload (`&str` / `String`) as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
