//! # Service contract.
//!
//! A [`Service`] is one component whose lifecycle is held by a
//! [`ServiceKeeper`](crate::ServiceKeeper): a connection pool, a cache, a client.
//! No ordering between services is assumed; the keeper calls them in parallel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::scope::Scope;

/// # Participant in the process lifecycle.
///
/// Every call receives a [`Scope`] bounding how long it may take; implementations
/// should watch [`Scope::done`] around blocking I/O and return promptly.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use appvisor::{AppError, Scope, Service};
///
/// struct Cache;
///
/// #[async_trait]
/// impl Service for Cache {
///     fn name(&self) -> &str { "cache" }
///
///     async fn init(&self, _scope: Scope) -> Result<(), AppError> { Ok(()) }
///
///     async fn ping(&self, scope: Scope) -> Result<(), AppError> {
///         if scope.is_done() {
///             return Err(scope.err().unwrap_or(AppError::Canceled));
///         }
///         Ok(())
///     }
///
///     async fn close(&self, _scope: Scope) -> Result<(), AppError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns a stable, human-readable service name.
    fn name(&self) -> &str;

    /// Prepares the service. Called once, in parallel with the other services.
    async fn init(&self, scope: Scope) -> Result<(), AppError>;

    /// Liveness check. An error is fatal for the application.
    async fn ping(&self, scope: Scope) -> Result<(), AppError>;

    /// Releases the service. Bounded by the keeper's shutdown timeout.
    async fn close(&self, scope: Scope) -> Result<(), AppError>;
}

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;
