//! # Application configuration.
//!
//! Provides [`AppConfig`] centralized settings for the application supervisor.
//!
//! ## Sentinel values
//! - `termination_timeout = 0s` → default (1s)
//! - `initialization_timeout = 0s` → default (15s)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Default wait between halt and the forced move to shutdown.
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(1);
/// Default bound for resources initialization.
pub const DEFAULT_INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for the application supervisor.
///
/// ## Field semantics
/// - `termination_timeout`: Maximum wait for the main function after halt, and for the
///   resources watch loop after stop (`0s` = default)
/// - `initialization_timeout`: Maximum time for `Resources::init` (`0s` = default)
/// - `bus_capacity`: how far a subscriber may fall behind before skipping events (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using the accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Maximum time to wait for the main function once shutdown began.
    ///
    /// When a termination signal is received:
    /// - hold-on is closed
    /// - the supervisor waits up to `termination_timeout` for main to return
    /// - if it does not, run returns `AppError::TermTimeout`
    pub termination_timeout: Duration,

    /// Maximum time for resources initialization.
    pub initialization_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl AppConfig {
    /// Returns the effective termination timeout.
    #[inline]
    pub fn termination_timeout(&self) -> Duration {
        non_zero_or(self.termination_timeout, DEFAULT_TERMINATION_TIMEOUT)
    }

    /// Returns the effective initialization timeout.
    #[inline]
    pub fn initialization_timeout(&self) -> Duration {
        non_zero_or(self.initialization_timeout, DEFAULT_INITIALIZATION_TIMEOUT)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for AppConfig {
    /// Default configuration:
    ///
    /// - `termination_timeout = 1s`
    /// - `initialization_timeout = 15s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            initialization_timeout: DEFAULT_INITIALIZATION_TIMEOUT,
            bus_capacity: 1024,
        }
    }
}

#[inline]
pub(crate) fn non_zero_or(value: Duration, default: Duration) -> Duration {
    if value == Duration::ZERO { default } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_durations_resolve_to_defaults() {
        let cfg = AppConfig {
            termination_timeout: Duration::ZERO,
            initialization_timeout: Duration::ZERO,
            bus_capacity: 0,
        };
        assert_eq!(cfg.termination_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.initialization_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn explicit_values_are_kept() {
        let cfg = AppConfig {
            termination_timeout: Duration::from_millis(20),
            ..AppConfig::default()
        };
        assert_eq!(cfg.termination_timeout(), Duration::from_millis(20));
    }
}
