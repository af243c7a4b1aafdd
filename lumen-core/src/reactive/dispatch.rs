//! Notification Dispatch
//!
//! Each atom owns a [`Dispatcher`] that decides what happens when an update
//! is applied while that atom is already notifying its subscribers.
//!
//! # Re-entrancy Policy
//!
//! 1. The first applied update starts a pass: every subscriber in the
//!    snapshot is called with the atom's current value.
//!
//! 2. An update to the same atom from inside that pass is stored right away
//!    but does not start a nested pass. It only flags the running pass as
//!    stale.
//!
//! 3. When the running pass ends and it is stale, one more pass runs with
//!    whatever value the atom holds by then. Several nested updates collapse
//!    into that single pass, so the last one wins. The extra pass runs even
//!    when the nested updates end on the value the stale pass just delivered
//!    (`set(2); set(1)` while delivering 1), so listeners can see that value
//!    twice. Effects that read the atom mid-pass may have observed the
//!    intermediate value and rely on that pass to catch up.
//!
//! 4. The loop is bounded. If listeners are still re-setting the atom after
//!    `max_passes` passes, dispatch stops and reports the cascade.
//!
//! Updates to *other* atoms from inside a pass are unaffected: they run
//! their own dispatcher synchronously.

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{ReactiveError, Result};
use super::subscriber::AtomId;

/// Outcome of an update, as returned by [`Atom::try_set`](super::Atom::try_set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The distinct gate rejected the value; nothing was stored or sent.
    Suppressed,

    /// This call ran the passes itself.
    Delivered {
        /// Number of passes that ran.
        passes: u32,
    },

    /// A pass was already running; it will pick up the new value.
    Deferred,
}

impl Dispatch {
    /// Whether the update was stored.
    pub fn is_applied(&self) -> bool {
        !matches!(self, Dispatch::Suppressed)
    }
}

#[derive(Debug, Default)]
struct PassState {
    active: bool,
    stale: bool,
}

/// Per-atom pass coordinator.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    state: Mutex<PassState>,
}

/// Clears the running flag if a listener panics mid-pass.
struct PassGuard<'a> {
    dispatcher: &'a Dispatcher,
    settled: bool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.dispatcher.state.lock();
        state.active = false;
        state.stale = false;
    }
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether a pass is currently running.
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Run `deliver` once per pass until no nested update arrives.
    ///
    /// `deliver` is called without the dispatcher lock held.
    pub(crate) fn run<F>(&self, atom: AtomId, max_passes: u32, mut deliver: F) -> Result<Dispatch>
    where
        F: FnMut(),
    {
        {
            let mut state = self.state.lock();
            if state.active {
                state.stale = true;
                trace!(atom = %atom, "update deferred to running pass");
                return Ok(Dispatch::Deferred);
            }
            state.active = true;
        }

        let mut guard = PassGuard {
            dispatcher: self,
            settled: false,
        };
        let mut passes = 0u32;

        loop {
            deliver();
            passes += 1;

            // Checking for a stale pass and releasing the running flag must
            // happen under one lock, or an update landing in between is lost.
            let mut state = self.state.lock();
            if !state.stale {
                state.active = false;
                guard.settled = true;
                trace!(atom = %atom, passes, "dispatch settled");
                return Ok(Dispatch::Delivered { passes });
            }
            state.stale = false;

            if passes >= max_passes {
                state.active = false;
                guard.settled = true;
                warn!(atom = %atom, passes, "update cascade did not settle; dropping further passes");
                return Err(ReactiveError::CascadeLimit { atom, passes });
            }
        }
    }
}
