//! # Collaborator contracts.
//!
//! This module provides the traits the supervisor drives:
//! - [`Main`] - the long-running routine hosted by the application
//! - [`MainFn`] - function-backed main implementation
//! - [`MainRef`] - shared reference to a main (`Arc<dyn Main>`)
//! - [`Service`] - a participant in the process lifecycle (init / ping / close)
//! - [`Resources`] - a lifecycle bundle exposed to the application (init / watch / stop / release)

mod main_fn;
mod resources;
mod service;

pub use main_fn::{Main, MainFn, MainRef};
pub use resources::{Resources, ResourcesRef};
pub use service::{Service, ServiceRef};
