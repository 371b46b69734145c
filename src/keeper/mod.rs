//! # Service keeper: lifecycle of a group of services.
//!
//! [`ServiceKeeper`] implements [`Resources`](crate::Resources) for a set of
//! [`Service`](crate::Service)s. It initializes them in parallel, pings them
//! periodically while the application runs, and closes them in parallel on release.
//!
//! ## State machine
//! ```text
//! Init ──init()──► Ready ──watch()──► Running ──stop()──► Shutdown ──release()──► Off
//!                    │                                       ▲
//!                    └──────────────── stop() ───────────────┘
//! ```
//!
//! - [`config`]: ping period, ping timeout, shutdown timeout;
//! - [`keeper`]: the state machine and the ping loop.

mod config;
mod keeper;

pub use config::{
    DEFAULT_PING_PERIOD, DEFAULT_PING_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, KeeperConfig,
};
pub use keeper::{KeeperState, ServiceKeeper};
