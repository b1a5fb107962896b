//! # Manager configuration.
//!
//! Provides [`ManagerConfig`], the settings fixed for a manager's lifetime.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` is clamped to 1 (the cap is always positive)
//! - `bus_capacity = 0` is clamped to 1

use std::borrow::Cow;

/// Configuration for a [`Manager`](crate::Manager).
///
/// ## Field semantics
/// - `max_concurrent`: at most this many tasks are resumed at any moment
/// - `bus_capacity`: event bus ring buffer size
/// - `name`: label attached to log records and spans
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Maximum number of tasks resumed simultaneously. Immutable once built.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers lagging behind more than `bus_capacity` events observe `Lagged`
    /// and skip older items.
    pub bus_capacity: usize,

    /// Manager name used in logs.
    pub name: Cow<'static, str>,
}

impl ManagerConfig {
    /// Config with the given cap and defaults for everything else.
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Self::default()
        }
    }

    /// Returns the concurrency cap clamped to a minimum of 1.
    #[inline]
    pub fn max_concurrent_clamped(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ManagerConfig {
    /// Default configuration:
    ///
    /// - `max_concurrent = 1` (strictly sequential, in priority order)
    /// - `bus_capacity = 1024`
    /// - `name = "taskrank"`
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            bus_capacity: 1024,
            name: Cow::Borrowed("taskrank"),
        }
    }
}
