//! Error types used by the appvisor runtime and its collaborators.
//!
//! This module defines:
//!
//! - [`AppError`]: every failure the supervisor, the service keeper and the
//!   collaborators (main function, services, resources) can report.
//! - [`AggregateError`]: an ordered bag of errors produced by a parallel
//!   fan-out (see [`FanOut`](crate::FanOut)).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! `AppError` is `Clone` so the supervisor can keep its first error and still hand it
//! out through [`Scope::err`](crate::Scope::err).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the appvisor runtime.
///
/// Runtime-originated variants (`WrongState`, `Shutdown`, `TermTimeout`, ...) describe
/// the lifecycle itself; [`AppError::Fail`] carries failures reported by collaborators.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// An operation was invoked against a state that does not permit it.
    #[error("wrong application state")]
    WrongState,

    /// [`Application::run`](crate::Application::run) was called without a main function.
    #[error("main function is omitted")]
    MainOmitted,

    /// Sentinel reported by the application scope once teardown has begun.
    ///
    /// Collaborators use it to tell cooperative termination from a real fault.
    #[error("application is in shutdown state")]
    Shutdown,

    /// The main function did not return within the termination timeout after halt.
    #[error("termination timeout {timeout:?} exceeded")]
    TermTimeout {
        /// The configured termination timeout.
        timeout: Duration,
    },

    /// A bounded scope fired before the work completed.
    #[error("deadline exceeded after {timeout:?}")]
    DeadlineExceeded {
        /// The bound of the scope that fired.
        timeout: Duration,
    },

    /// A derived scope was cancelled by its owner.
    #[error("context cancelled")]
    Canceled,

    /// A fan-out operation panicked; the panic was recovered into this error.
    #[error("unhandled error: {detail}")]
    Unhandled {
        /// Panic payload rendered as text.
        detail: String,
    },

    /// Several operations of a fan-out failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// OS signal handlers could not be installed.
    #[error("signal handler installation failed: {error}")]
    Signal {
        /// The underlying I/O error message.
        error: String,
    },

    /// Failure reported by a collaborator (service, resources or main function).
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl AppError {
    /// Wraps any displayable collaborator failure.
    ///
    /// # Example
    /// ```
    /// use appvisor::AppError;
    ///
    /// let err = AppError::fail("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        AppError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::AppError;
    /// use std::time::Duration;
    ///
    /// let err = AppError::TermTimeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "app_term_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AppError::WrongState => "app_wrong_state",
            AppError::MainOmitted => "app_main_omitted",
            AppError::Shutdown => "app_shutdown",
            AppError::TermTimeout { .. } => "app_term_timeout",
            AppError::DeadlineExceeded { .. } => "scope_deadline_exceeded",
            AppError::Canceled => "scope_canceled",
            AppError::Unhandled { .. } => "fanout_unhandled",
            AppError::Aggregate(_) => "fanout_aggregate",
            AppError::Signal { .. } => "app_signal",
            AppError::Fail { .. } => "collaborator_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            AppError::TermTimeout { timeout } => format!("main still running after {timeout:?}"),
            AppError::DeadlineExceeded { timeout } => format!("deadline: {timeout:?}"),
            AppError::Aggregate(agg) => format!("{} error(s): {agg}", agg.len()),
            other => other.to_string(),
        }
    }

    /// Indicates cooperative termination rather than a fault.
    ///
    /// Returns `true` for [`AppError::Shutdown`] and for an aggregate made only of it.
    ///
    /// # Example
    /// ```
    /// use appvisor::{AggregateError, AppError};
    ///
    /// assert!(AppError::Shutdown.is_shutdown());
    /// let agg = AppError::from(AggregateError::from(vec![AppError::Shutdown]));
    /// assert!(agg.is_shutdown());
    /// assert!(!AppError::fail("boom").is_shutdown());
    /// ```
    pub fn is_shutdown(&self) -> bool {
        match self {
            AppError::Shutdown => true,
            AppError::Aggregate(agg) => !agg.is_empty() && agg.iter().all(AppError::is_shutdown),
            _ => false,
        }
    }
}

/// # Ordered collection of errors from one fan-out.
///
/// Errors keep the order in which their operations completed.
///
/// ```text
/// the following errors occurred:
/// <e1>
/// <e2>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateError {
    errors: Vec<AppError>,
}

impl AggregateError {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one error.
    pub fn push(&mut self, err: AppError) {
        self.errors.push(err);
    }

    /// Number of collected errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over collected errors in completion order.
    pub fn iter(&self) -> std::slice::Iter<'_, AppError> {
        self.errors.iter()
    }

    /// Consumes the aggregate and returns the errors.
    pub fn into_inner(self) -> Vec<AppError> {
        self.errors
    }
}

impl From<Vec<AppError>> for AggregateError {
    fn from(errors: Vec<AppError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("something went wrong");
        }
        f.write_str("the following errors occurred:")?;
        for err in &self.errors {
            write!(f, "\n{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_renders_every_error_in_order() {
        let agg = AggregateError::from(vec![AppError::fail("e1"), AppError::fail("e2")]);
        assert_eq!(agg.to_string(), "the following errors occurred:\ne1\ne2");
    }

    #[test]
    fn single_error_still_reported_through_aggregate() {
        let err = AppError::from(AggregateError::from(vec![AppError::fail("only")]));
        assert_eq!(err.to_string(), "the following errors occurred:\nonly");
        assert_eq!(err.as_label(), "fanout_aggregate");
    }

    #[test]
    fn unhandled_error_prefix() {
        let err = AppError::Unhandled {
            detail: "boom".into(),
        };
        assert_eq!(err.to_string(), "unhandled error: boom");
    }

    #[test]
    fn mixed_aggregate_is_not_shutdown() {
        let agg = AggregateError::from(vec![AppError::Shutdown, AppError::fail("db down")]);
        assert!(!AppError::Aggregate(agg).is_shutdown());
        assert!(!AppError::Aggregate(AggregateError::new()).is_shutdown());
    }
}
