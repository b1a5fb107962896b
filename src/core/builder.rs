use std::sync::Arc;

use crate::{
    core::{ManagerConfig, PrioritySorter, manager::Manager},
    subscribers::Subscribe,
};

/// Builder for constructing a [`Manager`] with optional features.
pub struct ManagerBuilder {
    cfg: ManagerConfig,
    sorter: Option<PrioritySorter>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ManagerConfig) -> Self {
        Self {
            cfg,
            sorter: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the priority sorter used by [`Manager::refresh_priority`].
    ///
    /// With a sorter the priority list is also recomputed when `run` starts and
    /// after every accepted add.
    pub fn with_sorter<F>(mut self, sorter: F) -> Self
    where
        F: Fn(&[String]) -> Vec<String> + Send + Sync + 'static,
    {
        let sorter: PrioritySorter = Arc::new(sorter);
        self.sorter = Some(sorter);
        self
    }

    /// Same as [`with_sorter`](Self::with_sorter) for an already shared sorter
    /// (e.g. one built with [`rank_by`](crate::rank_by)).
    pub fn with_shared_sorter(mut self, sorter: PrioritySorter) -> Self {
        self.sorter = Some(sorter);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscriber workers are spawned when [`Manager::run`] starts.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager in the *pre-start* state.
    ///
    /// Does not need a tokio runtime.
    pub fn build(self) -> Arc<Manager> {
        Arc::new(Manager::new_internal(
            self.cfg,
            self.sorter,
            self.subscribers,
        ))
    }
}
