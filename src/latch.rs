//! # One-shot latches.
//!
//! A [`Latch`] starts open and is closed exactly once; every waiter wakes when it closes.
//! It is a thin layer over [`CancellationToken`] that additionally reports which caller
//! performed the close, so lifecycle code can publish the transition once.
//!
//! [`HoldOn`] is the read-only view of the application's hold-on latch handed to the
//! main function.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// One-shot signal shared between tasks.
#[derive(Clone, Debug, Default)]
pub(crate) struct Latch {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Closes the latch. Returns `true` only for the call that actually closed it.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the latch is closed.
    pub(crate) async fn wait(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// # Shutdown request observed by the main function.
///
/// Closed by [`Application::halt`](crate::Application::halt) when graceful shutdown
/// begins (OS signal, fatal resource error or explicit shutdown). The main function
/// should finish its in-flight work and return once it observes the close.
///
/// # Example
/// ```no_run
/// use appvisor::{AppError, HoldOn, Scope};
///
/// async fn serve(_scope: Scope, hold_on: HoldOn) -> Result<(), AppError> {
///     loop {
///         tokio::select! {
///             _ = hold_on.wait() => return Ok(()),
///             _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {
///                 // handle a batch of work...
///             }
///         }
///     }
/// }
/// ```
#[derive(Clone, Debug)]
pub struct HoldOn(Latch);

impl HoldOn {
    pub(crate) fn new(latch: Latch) -> Self {
        Self(latch)
    }

    /// Completes once shutdown has been requested.
    pub async fn wait(&self) {
        self.0.wait().await
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn concurrent_close_succeeds_once() {
        let latch = Latch::new();
        let wins = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let latch = latch.clone();
            let wins = wins.clone();
            handles.push(tokio::spawn(async move {
                if latch.close() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(latch.is_closed());
    }

    #[tokio::test]
    async fn waiters_wake_on_close() {
        let latch = Latch::new();
        let hold_on = HoldOn::new(latch.clone());
        let waiter = tokio::spawn(async move { hold_on.wait().await });

        assert!(latch.close());
        waiter.await.unwrap();
    }
}
