//! # Event subscribers.
//!
//! ```text
//!   Coordinator ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                    ┌────┴────┐
//!                                                                    ▼         ▼
//!                                                                LogWriter  Custom
//! ```
//!
//! - [`Subscribe`]: extension trait for custom handlers (metrics, audit, UI)
//! - [`SubscriberSet`]: per-subscriber bounded queues and workers
//! - `LogWriter` (feature `logging`): renders events through `tracing`

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
