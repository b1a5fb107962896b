//! # Subscriber trait.
//!
//! A [`Subscribe`] implementation receives every manager [`Event`] on its own
//! worker, fed through a bounded queue. A slow subscriber only delays itself:
//! once its queue is full further events are dropped for it and a
//! `SubscriberOverflow` event is published instead.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use taskrank::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Preemptions(AtomicUsize);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Preemptions {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TaskPaused {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "preemptions" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event handler plugged into a manager via
/// [`ManagerBuilder::with_subscribers`](crate::ManagerBuilder::with_subscribers).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Used in overflow/panic diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Bound of this subscriber's queue (minimum 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
