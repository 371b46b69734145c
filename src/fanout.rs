//! # Parallel fan-out with error aggregation.
//!
//! [`FanOut`] runs a group of fallible operations concurrently against one shared
//! [`Scope`] and joins them at a single point, collecting every failure.
//!
//! ## Architecture
//! ```text
//! spawn(scope, op1) ──► tokio task ──► op1(scope) ──┐
//! spawn(scope, op2) ──► tokio task ──► op2(scope) ──┼──► JoinSet ──► wait()
//! spawn(scope, opN) ──► tokio task ──► opN(scope) ──┘        │
//!                                                            ▼
//!                                       Ok(()) or AggregateError (completion order)
//! ```
//!
//! ## Rules
//! - Errors are collected in **completion order**.
//! - A panicking operation becomes [`AppError::Unhandled`] (`unhandled error: <payload>`);
//!   it never cancels the other operations and never escapes `wait()`.
//! - `wait()` consumes the fan-out: one join per instance.
//! - Dropping a fan-out before `wait()` completes aborts the operations still running.
//! - `wait_within(scope)` aborts what is still running once the scope is done and reports
//!   the scope's reason next to the errors already collected.

use std::any::Any;
use std::future::Future;

use tokio::task::{JoinError, JoinSet};

use crate::error::{AggregateError, AppError};
use crate::scope::Scope;

/// Concurrent runner of fallible operations.
///
/// # Example
/// ```
/// use appvisor::{AppError, FanOut, Scope};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scope = Scope::background();
/// let mut fan = FanOut::new();
/// fan.spawn(&scope, |_scope| async { Ok(()) });
/// fan.spawn(&scope, |_scope| async { Err(AppError::fail("db down")) });
///
/// let agg = fan.wait().await.unwrap_err();
/// assert_eq!(agg.to_string(), "the following errors occurred:\ndb down");
/// # }
/// ```
#[derive(Default)]
pub struct FanOut {
    set: JoinSet<Result<(), AppError>>,
}

impl FanOut {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `op(scope)` to run concurrently with the other spawned operations.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(&mut self, scope: &Scope, op: F)
    where
        F: FnOnce(Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let scope = scope.clone();
        self.set.spawn(async move { op(scope).await });
    }

    /// Number of operations not joined yet.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Waits for every operation and returns the collected failures.
    pub async fn wait(mut self) -> Result<(), AggregateError> {
        let mut agg = AggregateError::new();
        while let Some(joined) = self.set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => agg.push(err),
                Err(join_err) => agg.push(AppError::Unhandled {
                    detail: join_error_detail(join_err),
                }),
            }
        }
        if agg.is_empty() { Ok(()) } else { Err(agg) }
    }

    /// Like [`wait`](FanOut::wait), but stops waiting once `scope` is done.
    ///
    /// Operations still running at that point are aborted and reported once as the
    /// scope's reason; errors that completed before are kept.
    pub async fn wait_within(mut self, scope: &Scope) -> Result<(), AggregateError> {
        let mut agg = AggregateError::new();
        let mut expired = false;
        let mut aborted = false;
        loop {
            let joined = if expired {
                self.set.join_next().await
            } else {
                let next = tokio::select! {
                    biased;
                    joined = self.set.join_next() => Some(joined),
                    _ = scope.done() => None,
                };
                match next {
                    Some(joined) => joined,
                    None => {
                        expired = true;
                        self.set.abort_all();
                        continue;
                    }
                }
            };
            match joined {
                None => break,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(err))) => agg.push(err),
                Some(Err(join_err)) if join_err.is_cancelled() => aborted = true,
                Some(Err(join_err)) => agg.push(AppError::Unhandled {
                    detail: join_error_detail(join_err),
                }),
            }
        }
        if aborted {
            agg.push(scope.err().unwrap_or(AppError::Canceled));
        }
        if agg.is_empty() { Ok(()) } else { Err(agg) }
    }
}

fn join_error_detail(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(&*err.into_panic())
    } else {
        err.to_string()
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
