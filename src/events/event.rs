//! # Runtime events emitted by the application supervisor and the service keeper.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Application lifecycle**: init, main start/exit, halt, shutdown, teardown
//! - **Error flow**: first error recorded, later errors dropped
//! - **Service health**: per-service init/ping/close failures reported by the keeper
//! - **Subscriber health**: panics and overflows in subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, component name,
//! reasons, and timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use appvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ServicePingFailed)
//!     .with_component("postgres")
//!     .with_reason("connection refused")
//!     .with_timeout(Duration::from_millis(1500));
//!
//! assert_eq!(ev.kind, EventKind::ServicePingFailed);
//! assert_eq!(ev.component.as_deref(), Some("postgres"));
//! assert_eq!(ev.timeout_ms, Some(1500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Application lifecycle ===
    /// Run entered; resources are being initialized.
    ///
    /// Sets:
    /// - `timeout_ms`: initialization timeout
    InitStarted,

    /// Initialization failed; the application moves straight to shutdown.
    ///
    /// Sets:
    /// - `reason`: init error
    InitFailed,

    /// Main function spawned.
    ///
    /// Sets:
    /// - `component`: main name
    MainStarted,

    /// Main function returned.
    ///
    /// Sets:
    /// - `component`: main name
    /// - `reason`: error message (only when it failed)
    MainExited,

    /// OS termination signal observed.
    ///
    /// Sets:
    /// - `reason`: signal name
    SignalReceived,

    /// Hold-on closed: graceful shutdown began.
    HaltRequested,

    /// Done closed: the application reached its shutdown state.
    ShutdownRequested,

    /// Main did not return within the termination timeout after halt.
    ///
    /// Sets:
    /// - `timeout_ms`: termination timeout
    TerminationTimeout,

    // === Error flow ===
    /// First error stored; it becomes the run result.
    ///
    /// Sets:
    /// - `reason`: error message
    ErrorRecorded,

    /// An error arrived after the first one and was dropped from the result.
    ///
    /// Sets:
    /// - `reason`: error message
    ErrorDropped,

    // === Teardown ===
    /// Resources watch loop returned.
    WatchExited,

    /// Resources watch loop did not return within the termination timeout.
    ///
    /// Sets:
    /// - `timeout_ms`: termination timeout
    WatchTimeout,

    /// Resources released without error.
    ReleaseCompleted,

    /// Resources release failed.
    ///
    /// Sets:
    /// - `reason`: error message
    ReleaseFailed,

    // === Service health (keeper) ===
    /// A service failed to initialize.
    ///
    /// Sets:
    /// - `component`: service name
    /// - `reason`: error message
    ServiceInitFailed,

    /// A service failed its liveness check.
    ///
    /// Sets:
    /// - `component`: service name
    /// - `reason`: error message
    /// - `timeout_ms`: ping timeout
    ServicePingFailed,

    /// A service failed to close.
    ///
    /// Sets:
    /// - `component`: service name
    /// - `reason`: error message
    ServiceCloseFailed,

    /// A ping cycle failed; the watch loop ends with its aggregate.
    ///
    /// Sets:
    /// - `reason`: aggregate message
    PingCycleFailed,

    // === Subscriber health ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `component`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber fell behind the event ring and missed events.
    ///
    /// Handed to the lagging subscriber itself, not published.
    ///
    /// Sets:
    /// - `component`: subscriber name
    /// - `reason`: how many events were skipped
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the main, service or subscriber, if applicable.
    pub component: Option<Arc<str>>,
    /// Human-readable reason (errors, signal names, overflow details).
    pub reason: Option<Arc<str>>,
    /// Relevant timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            component: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a component name.
    #[inline]
    pub fn with_component(mut self, component: impl Into<Arc<str>>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event for `skipped` missed events.
    pub fn subscriber_overflow(subscriber: &'static str, skipped: u64) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_component(subscriber)
            .with_reason(format!("lagged by {skipped} events"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_component(subscriber)
            .with_reason(info)
    }
}
