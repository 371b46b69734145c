//! # appvisor
//!
//! **Appvisor** is a lifecycle supervisor for long-running async services.
//!
//! It hosts one main function next to a group of services, initializes them,
//! keeps them alive with periodic pings, listens for termination signals and
//! performs a bounded, ordered graceful shutdown. The crate is designed as the
//! skeleton of a server binary: you bring the main loop and the services.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐        ┌──────────────────────────────────────────┐
//!     │     Main     │        │             ServiceKeeper                │
//!     │ (your loop)  │        │  Service #1   Service #2   Service #3    │
//!     └──────┬───────┘        └──────────────────┬───────────────────────┘
//!            │ run(scope, hold_on)               │ Resources: init / watch / stop / release
//!            ▼                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Application (lifecycle supervisor)                               │
//! │  - state machine  Init → Running → Halt → Shutdown                │
//! │  - hold-on latch  (graceful shutdown request for main)            │
//! │  - done latch     (root Scope is done)                            │
//! │  - first error    (write-once run result)                         │
//! │  - signal listener (SIGHUP, SIGINT, SIGTERM, SIGQUIT)             │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ publishes lifecycle events
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    event ring (broadcast channel)                 │
//! │                 (capacity: AppConfig::bus_capacity)               │
//! └──────────┬──────────────────────┬──────────────────────┬──────────┘
//!            ▼                      ▼                      ▼
//!     worker (own reader)    worker (own reader)    Application::subscribe()
//!            ▼                      ▼
//!        LogWriter               Custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! Application::run()
//!   ├─► Resources::init       (bounded by initialization_timeout)
//!   ├─► Resources::watch      (ServiceKeeper: ping every ping_period, bounded by ping_timeout)
//!   ├─► Main::run             (until it returns or hold-on closes)
//!   ├─► signal ─► halt ─► wait main (bounded by termination_timeout)
//!   └─► teardown:
//!         Resources::stop ─► wait watch ─► Resources::release (bounded by shutdown_timeout)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Run a main function with signal-driven graceful shutdown.       | [`Application`], [`Main`], [`MainFn`]       |
//! | **Services**      | Parallel init, periodic liveness pings, bounded parallel close. | [`ServiceKeeper`], [`Service`]              |
//! | **Cancellation**  | Deadlines and done signals passed to every collaborator call.   | [`Scope`], [`HoldOn`]                       |
//! | **Fan-out**       | Run fallible operations in parallel, collect every failure.     | [`FanOut`], [`AggregateError`]              |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, alerts).          | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed lifecycle and collaborator errors.                        | [`AppError`]                                |
//! | **Configuration** | Timeouts with zero-means-default sentinels.                     | [`AppConfig`], [`KeeperConfig`]             |
//!
//! ## Optional features
//! - `logging` _(default)_: exports the built-in [`LogWriter`] rendering events through `tracing`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use appvisor::{
//!     AppConfig, AppError, Application, HoldOn, KeeperConfig, MainFn, Scope, ServiceKeeper,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let keeper = ServiceKeeper::new(Vec::new(), KeeperConfig::default());
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn appvisor::Subscribe>> = vec![Arc::new(appvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn appvisor::Subscribe>> = Vec::new();
//!
//!     let app = Application::builder(AppConfig::default())
//!         .with_main(MainFn::arc("ticker", |_scope: Scope, hold_on: HoldOn| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = hold_on.wait() => return Ok::<_, AppError>(()),
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => println!("tick"),
//!                 }
//!             }
//!         }))
//!         .with_resources(Arc::new(keeper))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     app.run().await
//! }
//! ```
mod core;
mod error;
mod events;
mod fanout;
mod keeper;
mod latch;
mod lifecycle;
mod scope;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use self::core::{
    AppConfig, AppState, Application, ApplicationBuilder, DEFAULT_INITIALIZATION_TIMEOUT,
    DEFAULT_TERMINATION_TIMEOUT,
};
pub use error::{AggregateError, AppError};
pub use events::{Event, EventKind};
pub use fanout::FanOut;
pub use keeper::{
    DEFAULT_PING_PERIOD, DEFAULT_PING_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, KeeperConfig,
    KeeperState, ServiceKeeper,
};
pub use latch::HoldOn;
pub use lifecycle::{Main, MainFn, MainRef, Resources, ResourcesRef, Service, ServiceRef};
pub use scope::Scope;
pub use subscribers::Subscribe;

// Optional: expose the built-in tracing subscriber.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
