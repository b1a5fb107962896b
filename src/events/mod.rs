//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the coordinator loop, `Manager` (pre-start rejections,
//!   close), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Manager::subscribe()` receivers and the subscriber listener
//!   spawned by `Manager::run`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
