//! # Event subscribers.
//!
//! A [`Subscribe`] implementation receives every lifecycle [`Event`] of the application it
//! is registered with. The built-in [`LogWriter`] renders them through `tracing`.
//!
//! ```text
//!   Application / Keeper ── publish ──► event ring ──┬──► worker ──► LogWriter::on_event
//!                                                    ├──► worker ──► Metrics::on_event
//!                                                    └──► worker ──► Custom::on_event
//! ```
//!
//! Each subscriber gets one worker task with its own reader on the ring:
//! - events arrive in publish order; there is no ordering across subscribers
//! - a subscriber that falls more than `bus_capacity` events behind skips the oldest ones
//!   and is handed a [`EventKind::SubscriberOverflow`](crate::EventKind::SubscriberOverflow)
//!   saying how many
//! - a panic inside `on_event` is caught and published as `SubscriberPanicked`
//! - on shutdown, workers deliver what is already in the ring, bounded by the termination
//!   timeout
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use appvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ServicePingFailed {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod workers;

use async_trait::async_trait;

use crate::events::Event;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use workers::SubscriberWorkers;

/// Receiver of lifecycle events.
///
/// Runs on its own worker task, so a slow handler only delays itself.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
