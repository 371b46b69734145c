//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records, so lifecycle
//! output lands wherever the host process routes its logs.
//!
//! ## Levels
//! - `error`: init failure, termination timeout, release failure, subscriber panic
//! - `warn`: service failures, dropped errors, watch timeout, overflow, OS signal
//! - `info`: main start/exit, halt, shutdown, release
//! - `debug`: everything else
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO appvisor: main started main="zooad"
//! WARN appvisor: signal received signal="SIGTERM"
//! INFO appvisor: halt requested
//! INFO appvisor: shutdown requested
//! INFO appvisor: resources released
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let component = e.component.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::InitStarted => {
                debug!(target: "appvisor", seq = e.seq, timeout_ms = ?e.timeout_ms, "init started");
            }
            EventKind::InitFailed => {
                error!(target: "appvisor", seq = e.seq, err = reason, "init failed");
            }
            EventKind::MainStarted => {
                info!(target: "appvisor", seq = e.seq, main = component, "main started");
            }
            EventKind::MainExited => match &e.reason {
                Some(err) => warn!(target: "appvisor", seq = e.seq, main = component, err = &**err, "main exited"),
                None => info!(target: "appvisor", seq = e.seq, main = component, "main exited"),
            },
            EventKind::SignalReceived => {
                warn!(target: "appvisor", seq = e.seq, signal = reason, "signal received");
            }
            EventKind::HaltRequested => {
                info!(target: "appvisor", seq = e.seq, "halt requested");
            }
            EventKind::ShutdownRequested => {
                info!(target: "appvisor", seq = e.seq, "shutdown requested");
            }
            EventKind::TerminationTimeout => {
                error!(target: "appvisor", seq = e.seq, timeout_ms = ?e.timeout_ms, "termination timeout exceeded");
            }
            EventKind::ErrorRecorded => {
                debug!(target: "appvisor", seq = e.seq, err = reason, "error recorded");
            }
            EventKind::ErrorDropped => {
                warn!(target: "appvisor", seq = e.seq, err = reason, "error dropped, first error already recorded");
            }
            EventKind::WatchExited => {
                debug!(target: "appvisor", seq = e.seq, "resources watch exited");
            }
            EventKind::WatchTimeout => {
                warn!(target: "appvisor", seq = e.seq, timeout_ms = ?e.timeout_ms, "resources watch still running");
            }
            EventKind::ReleaseCompleted => {
                info!(target: "appvisor", seq = e.seq, "resources released");
            }
            EventKind::ReleaseFailed => {
                error!(target: "appvisor", seq = e.seq, err = reason, "resources release failed");
            }
            EventKind::ServiceInitFailed => {
                warn!(target: "appvisor", seq = e.seq, service = component, err = reason, "service init failed");
            }
            EventKind::ServicePingFailed => {
                warn!(target: "appvisor", seq = e.seq, service = component, err = reason, timeout_ms = ?e.timeout_ms, "service ping failed");
            }
            EventKind::ServiceCloseFailed => {
                warn!(target: "appvisor", seq = e.seq, service = component, err = reason, "service close failed");
            }
            EventKind::PingCycleFailed => {
                warn!(target: "appvisor", seq = e.seq, err = reason, "ping cycle failed");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "appvisor", seq = e.seq, subscriber = component, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "appvisor", seq = e.seq, subscriber = component, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
