//! # Service keeper configuration.
//!
//! ## Sentinel values
//! - `ping_period = 0s` → default (5s)
//! - `ping_timeout = 0s` → default (1.5s)
//! - `shutdown_timeout = 0s` → default (15s)

use std::time::Duration;

use crate::core::non_zero_or;

/// Default spacing between ping cycle starts.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(5);
/// Default bound for one ping cycle.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(1500);
/// Default bound for closing every service.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Timing knobs of a [`ServiceKeeper`](crate::ServiceKeeper).
#[derive(Clone, Debug)]
pub struct KeeperConfig {
    /// Minimum time between the starts of two consecutive ping cycles.
    pub ping_period: Duration,
    /// Maximum duration of one ping cycle across all services.
    pub ping_timeout: Duration,
    /// Maximum duration of release (closing every service).
    pub shutdown_timeout: Duration,
}

impl KeeperConfig {
    /// Returns the effective ping period.
    #[inline]
    pub fn ping_period(&self) -> Duration {
        non_zero_or(self.ping_period, DEFAULT_PING_PERIOD)
    }

    /// Returns the effective ping timeout.
    #[inline]
    pub fn ping_timeout(&self) -> Duration {
        non_zero_or(self.ping_timeout, DEFAULT_PING_TIMEOUT)
    }

    /// Returns the effective shutdown timeout.
    #[inline]
    pub fn shutdown_timeout(&self) -> Duration {
        non_zero_or(self.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            ping_period: DEFAULT_PING_PERIOD,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
