//! Runtime core: the application supervisor.
//!
//! The public API from this module is [`Application`], which runs the main function,
//! drives resources and performs graceful shutdown.
//!
//! Internal modules:
//! - [`application`]: lifecycle state machine, run loop, teardown;
//! - [`builder`]: wires main, resources and subscribers;
//! - [`config`]: timeouts and bus capacity;
//! - [`shutdown`]: cross-platform termination signal handling.

mod application;
mod builder;
mod config;
mod shutdown;

pub(crate) use application::Shared;
pub use application::{AppState, Application};
pub use builder::ApplicationBuilder;
pub use config::{AppConfig, DEFAULT_INITIALIZATION_TIMEOUT, DEFAULT_TERMINATION_TIMEOUT};
pub(crate) use config::non_zero_or;
