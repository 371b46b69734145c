//! # Main routine and its function-backed implementation.
//!
//! [`Main`] is the long-running routine an [`Application`](crate::Application) hosts
//! (an HTTP server, a consumer loop). [`MainFn`] wraps a closure
//! `F: Fn(Scope, HoldOn) -> Fut`, producing a fresh future per run.
//!
//! ## Contract
//! - The main returns when its work is done or once [`HoldOn`] closes.
//! - Returning an error makes it the application's run error.
//! - A panic is recovered and reported as [`AppError::Unhandled`].
//!
//! ## Example
//! ```rust
//! use appvisor::{AppError, HoldOn, MainFn, MainRef, Scope};
//!
//! let m: MainRef = MainFn::arc("server", |_scope: Scope, hold_on: HoldOn| async move {
//!     hold_on.wait().await;
//!     Ok::<_, AppError>(())
//! });
//!
//! assert_eq!(m.name(), "server");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::latch::HoldOn;
use crate::scope::Scope;

/// Long-running routine hosted by the application.
#[async_trait]
pub trait Main: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Runs until completion or until `hold_on` closes.
    async fn run(&self, scope: Scope, hold_on: HoldOn) -> Result<(), AppError>;
}

/// Shared handle to a main routine.
pub type MainRef = Arc<dyn Main>;

/// Function-backed main implementation.
#[derive(Debug)]
pub struct MainFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> MainFn<F> {
    /// Creates a new function-backed main.
    ///
    /// Prefer [`MainFn::arc`] when you immediately need a [`MainRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the main and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Main for MainFn<F>
where
    F: Fn(Scope, HoldOn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, scope: Scope, hold_on: HoldOn) -> Result<(), AppError> {
        (self.f)(scope, hold_on).await
    }
}
