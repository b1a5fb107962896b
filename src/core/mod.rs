//! Runtime core: coordination and lifecycle.
//!
//! The public API of this module is [`Manager`] (with [`ManagerBuilder`] and
//! [`ManagerConfig`]) plus the priority sorter helpers.
//!
//! Internal modules:
//! - [`coordinator`]: the single event loop owning the running-state bookkeeping;
//! - [`reconcile`]: pure desired-running-set computation;
//! - [`wrapper`]: dispatch adapter reporting task completion to the coordinator.

mod builder;
mod config;
mod coordinator;
mod manager;
mod reconcile;
mod sorter;
mod wrapper;

pub use builder::ManagerBuilder;
pub use config::ManagerConfig;
pub use manager::Manager;
pub use sorter::{PrioritySorter, rank_by};
