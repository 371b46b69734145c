//! # Cancellation scopes.
//!
//! A [`Scope`] is handed to every long-running collaborator call (main function, service
//! `init`/`ping`/`close`, resources `init`/`watch`). It carries:
//!
//! - an optional **deadline** ([`Scope::deadline`]),
//! - a **done** signal ([`Scope::done`], [`Scope::is_done`]),
//! - the **reason** it ended ([`Scope::err`]),
//! - a lookup of the owning [`Application`] ([`Scope::application`]).
//!
//! ## Tree
//! ```text
//! Application scope (root: done = application done latch, err = first error / Shutdown)
//!   ├─► with_timeout(initialization_timeout) ─► Resources::init
//!   │         └─► with_cancel() ─► Service::init (fan-out)
//!   └─► Resources::watch
//!             └─► with_timeout(ping_timeout) ─► Service::ping (fan-out, per cycle)
//!
//! Scope::background() (unparented)
//!   └─► with_timeout(shutdown_timeout) ─► Service::close (fan-out)
//! ```
//!
//! ## Rules
//! - A derived scope is done when its parent is done, when its own deadline passes, or
//!   when its [`DropGuard`] is dropped.
//! - A derived deadline never extends the parent's deadline.
//! - `err()` reports the parent's reason first, then `DeadlineExceeded`, then `Canceled`.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::core::{Application, Shared};
use crate::error::AppError;

#[derive(Clone, Copy, Debug)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

enum Origin {
    Background,
    Application(Arc<Shared>),
    Derived {
        parent: Scope,
        /// Set when the deadline was introduced by this scope rather than inherited.
        own_deadline: bool,
        reason: OnceLock<AppError>,
    },
}

struct Inner {
    origin: Origin,
    token: CancellationToken,
    deadline: Option<Deadline>,
}

/// Cancellation scope passed to collaborators.
///
/// Cheap to clone; clones observe the same signal.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// An unparented scope that is never done on its own.
    ///
    /// Used as the root for work that must get its full deadline even when the
    /// application is already shutting down.
    pub fn background() -> Self {
        Self::root(Origin::Background, CancellationToken::new())
    }

    /// Root scope of an application: done when its done latch closes.
    pub(crate) fn for_application(shared: Arc<Shared>, done: CancellationToken) -> Self {
        Self::root(Origin::Application(shared), done)
    }

    fn root(origin: Origin, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                origin,
                token,
                deadline: None,
            }),
        }
    }

    /// Derives a child scope that ends when the returned guard is dropped.
    pub fn with_cancel(&self) -> (Scope, DropGuard) {
        self.derive(None)
    }

    /// Derives a child scope bounded by `timeout` from now.
    ///
    /// The child keeps the parent's deadline when that one is earlier.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use appvisor::Scope;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let (scope, _guard) = Scope::background().with_timeout(Duration::from_millis(10));
    /// scope.done().await;
    /// assert!(scope.err().is_some());
    /// # }
    /// ```
    pub fn with_timeout(&self, timeout: Duration) -> (Scope, DropGuard) {
        let candidate = Deadline {
            at: Instant::now() + timeout,
            timeout,
        };
        self.derive(Some(candidate))
    }

    fn derive(&self, candidate: Option<Deadline>) -> (Scope, DropGuard) {
        let inherited = self.inner.deadline;
        let (deadline, own_deadline) = match (inherited, candidate) {
            (Some(parent), Some(own)) if parent.at <= own.at => (Some(parent), false),
            (_, Some(own)) => (Some(own), true),
            (parent, None) => (parent, false),
        };

        let token = self.inner.token.child_token();
        let guard = token.clone().drop_guard();
        let scope = Scope {
            inner: Arc::new(Inner {
                origin: Origin::Derived {
                    parent: self.clone(),
                    own_deadline,
                    reason: OnceLock::new(),
                },
                token,
                deadline,
            }),
        };
        (scope, guard)
    }

    /// Effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline.map(|d| d.at)
    }

    /// Returns `true` once the scope is done.
    pub fn is_done(&self) -> bool {
        self.inner.token.is_cancelled() || self.deadline_passed()
    }

    /// Completes once the scope is done.
    pub async fn done(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = time::sleep_until(deadline.at) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    /// Why the scope ended, or `None` while it is still live.
    ///
    /// For an application scope: the first recorded error, otherwise
    /// [`AppError::Shutdown`] once the application reached its shutdown state.
    pub fn err(&self) -> Option<AppError> {
        match &self.inner.origin {
            Origin::Background => self.inner.token.is_cancelled().then_some(AppError::Canceled),
            Origin::Application(shared) => shared.scope_err(),
            Origin::Derived {
                parent,
                own_deadline,
                reason,
            } => {
                if let Some(err) = parent.err() {
                    return Some(err);
                }
                if let Some(err) = reason.get() {
                    return Some(err.clone());
                }
                let err = match self.inner.deadline {
                    Some(d) if *own_deadline && Instant::now() >= d.at => {
                        AppError::DeadlineExceeded { timeout: d.timeout }
                    }
                    _ if self.inner.token.is_cancelled() => AppError::Canceled,
                    _ => return None,
                };
                Some(reason.get_or_init(|| err).clone())
            }
        }
    }

    /// The application this scope descends from, if any.
    ///
    /// Lets deep callers reach the supervisor without threading it through every call.
    pub fn application(&self) -> Option<Application> {
        match &self.inner.origin {
            Origin::Background => None,
            Origin::Application(shared) => Some(Application::from_shared(shared.clone())),
            Origin::Derived { parent, .. } => parent.application(),
        }
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|d| Instant::now() >= d.at)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.inner.origin {
            Origin::Background => "background",
            Origin::Application(_) => "application",
            Origin::Derived { .. } => "derived",
        };
        f.debug_struct("Scope")
            .field("origin", &origin)
            .field("deadline", &self.inner.deadline)
            .field("done", &self.is_done())
            .finish()
    }
}
