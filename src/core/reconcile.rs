//! # Reconciliation planning.
//!
//! Pure functions computing which tasks must run and how to get there from the
//! current running set. The coordinator applies the resulting [`Plan`].
//!
//! ```text
//! priority: [t3, t1, t9, t2]    live: {t1, t2, t3}    max: 2
//!   desired = [t3, t1]          (t9 skipped: not live)
//!   running = [t1, t2]
//!   plan    = pause [t2], resume [t3]
//! ```
//!
//! ## Rules
//! - Only ids that are in the priority list and name a live task are desired.
//! - Duplicate ids: the first occurrence wins.
//! - Pauses are applied before resumes, so the running set never exceeds `max`.

use std::collections::HashSet;

/// Steps turning the running set into the desired running set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    /// In running-set order.
    pub pause: Vec<String>,
    /// In priority order.
    pub resume: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.pause.is_empty() && self.resume.is_empty()
    }
}

/// Top-`max` live ids of `priority`, most important first.
pub(crate) fn desired_running_set(
    priority: &[String],
    is_live: impl Fn(&str) -> bool,
    max: usize,
) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut desired = Vec::with_capacity(max.min(priority.len()));
    for id in priority {
        if desired.len() >= max {
            break;
        }
        if is_live(id.as_str()) && seen.insert(id.as_str()) {
            desired.push(id.clone());
        }
    }
    desired
}

/// Diff between the desired running set and the current one.
pub(crate) fn plan(desired: &[String], running: &[String]) -> Plan {
    Plan {
        pause: running
            .iter()
            .filter(|id| !desired.contains(id))
            .cloned()
            .collect(),
        resume: desired
            .iter()
            .filter(|id| !running.contains(id))
            .cloned()
            .collect(),
    }
}
