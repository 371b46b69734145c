//! # Resources contract.
//!
//! [`Resources`] is the coarse-grained collaborator an [`Application`](crate::Application)
//! holds next to its main function. The application calls it in a fixed order:
//!
//! ```text
//! init(scope) ──► watch(scope) (background) ... stop() ──► [watch returns] ──► release()
//! ```
//!
//! [`ServiceKeeper`](crate::ServiceKeeper) is the provided implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::scope::Scope;

/// Lifecycle bundle driven by the application.
#[async_trait]
pub trait Resources: Send + Sync + 'static {
    /// Prepares the resources. Bounded by the application's initialization timeout.
    async fn init(&self, scope: Scope) -> Result<(), AppError>;

    /// Watches the resources until [`stop`](Resources::stop) is requested or a fatal
    /// error occurs. An error returned here becomes the application's run error.
    async fn watch(&self, scope: Scope) -> Result<(), AppError>;

    /// Requests `watch` to return. Must not block.
    fn stop(&self);

    /// Final teardown, called once `watch` has returned (or the termination wait expired).
    async fn release(&self) -> Result<(), AppError>;
}

/// Shared handle to resources.
pub type ResourcesRef = Arc<dyn Resources>;
