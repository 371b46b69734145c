//! # Cross-platform OS signal handling.
//!
//! Provides [`ShutdownSignals`], the set of termination signals the application listens
//! to. Handlers are installed eagerly by [`ShutdownSignals::install`] so that no signal
//! delivered after `Application::run` started can fall back to the default action.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGHUP` (controlling terminal closed)
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! All of them trigger the same graceful shutdown.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Installed termination signal listeners.
#[cfg(unix)]
pub(crate) struct ShutdownSignals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Installs listeners for every termination signal.
    ///
    /// Returns `Err` if signal registration fails.
    pub(crate) fn install() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the next termination signal and returns its name.
    pub(crate) async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv()    => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv()      => "SIGQUIT",
        }
    }
}

/// Installed termination signal listeners.
#[cfg(not(unix))]
pub(crate) struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub(crate) fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub(crate) async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL-C",
            Err(_) => std::future::pending().await,
        }
    }
}
