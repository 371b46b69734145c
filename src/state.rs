//! # Compare-and-set lifecycle states.
//!
//! Both the [`Application`](crate::Application) and the
//! [`ServiceKeeper`](crate::ServiceKeeper) keep their lifecycle in an explicit enum with a
//! transition table. [`StateCell`] stores the enum in an atomic byte; a transition succeeds
//! only for the caller whose compare-and-set observes the expected source state.
//!
//! ## Rules
//! - States are monotonic: no state is ever revisited.
//! - Exactly one of many concurrent callers wins a given transition.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// A lifecycle enumeration with a static transition table.
pub(crate) trait Lifecycle: Copy + Eq + Debug {
    fn to_raw(self) -> u8;

    fn from_raw(raw: u8) -> Self;

    /// Returns `true` if `from → to` appears in the transition table.
    fn allows(from: Self, to: Self) -> bool;
}

/// Atomic holder of a [`Lifecycle`] state.
pub(crate) struct StateCell<S> {
    raw: AtomicU8,
    _state: PhantomData<S>,
}

impl<S: Lifecycle> StateCell<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            raw: AtomicU8::new(initial.to_raw()),
            _state: PhantomData,
        }
    }

    pub(crate) fn load(&self) -> S {
        S::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Moves `from → to` if the current state is `from`.
    ///
    /// Transitions missing from the table never succeed.
    pub(crate) fn transition(&self, from: S, to: S) -> bool {
        if !S::allows(from, to) {
            return false;
        }
        self.raw
            .compare_exchange(from.to_raw(), to.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl<S: Lifecycle> Debug for StateCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateCell").field(&self.load()).finish()
    }
}
