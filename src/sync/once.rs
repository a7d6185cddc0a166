//! Exactly-once execution guard.
//!
//! [`Once::call_once`] runs its action exactly once across any number of
//! concurrent callers. Every caller that returns observes the action's
//! effects as complete — a visibility guarantee, not merely a "someone ran
//! it" guarantee.
//!
//! The state machine is a single atomic with three values
//! (pending/running/complete). The fast path is an acquire-ordered load of
//! that same atomic, and the committing transition is a compare-and-swap —
//! never a plain flag read outside the lock paired with a plain write
//! inside one. That split-flag shape allows a completed action to be
//! invisible to a racing fast-path reader, and allows two contexts to both
//! observe "not done" and both execute; a single atomic with
//! acquire/release ordering rules both failures out.
//!
//! # Example
//!
//! ```
//! use synckit::Once;
//!
//! static INIT: Once = Once::new();
//!
//! INIT.call_once(|| {
//!     // runs exactly once, no matter how many threads race here
//! });
//! assert!(INIT.is_completed());
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex as StdMutex};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETE: u8 = 2;

/// Executes an action exactly once across all calling threads.
///
/// Created pending. The first caller to win the pending→running transition
/// runs the action; concurrent callers block until it publishes complete;
/// later callers return immediately from the fast path.
///
/// `Once` is move-only; share it by reference, `Arc`, or `static`.
#[derive(Debug)]
pub struct Once {
    state: AtomicU8,
    /// Pairs with `cvar` for blocking losers of the entry race.
    lock: StdMutex<()>,
    cvar: Condvar,
}

/// Restores `PENDING` if the executing action unwinds, so a later caller
/// can retry. Forgotten on the publish path.
struct ResetOnPanic<'a> {
    once: &'a Once,
}

impl Drop for ResetOnPanic<'_> {
    fn drop(&mut self) {
        self.once.state.store(PENDING, Ordering::Release);
        self.once.wake_waiters();
    }
}

impl Once {
    /// Creates a pending guard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            lock: StdMutex::new(()),
            cvar: Condvar::new(),
        }
    }

    /// Returns true once the action has run and published its effects.
    ///
    /// Uses acquire ordering: a true result means the caller also sees
    /// everything the action wrote.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETE
    }

    /// Runs `action` if no call has completed yet.
    ///
    /// Exactly one caller executes the action. Callers arriving while it
    /// runs block until it completes; callers arriving after completion
    /// return immediately. In every case, returning from `call_once` means
    /// the action's effects are visible to this thread.
    ///
    /// If the executing action panics, the guard returns to pending, the
    /// panic propagates to that caller, and a subsequent caller runs its
    /// own action. "Completed" therefore always means "ran exactly once,
    /// to the end".
    pub fn call_once<F>(&self, action: F)
    where
        F: FnOnce(),
    {
        // Fast path: completion already published.
        if self.is_completed() {
            return;
        }
        let mut action = Some(action);
        loop {
            match self.state.compare_exchange(
                PENDING,
                RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::trace!("once action executing");
                    let reset = ResetOnPanic { once: self };
                    let action = action.take().expect("action consumed twice");
                    action();
                    std::mem::forget(reset);
                    self.state.store(COMPLETE, Ordering::Release);
                    self.wake_waiters();
                    return;
                }
                Err(RUNNING) => {
                    self.block_while_running();
                    // Either published (fast return below) or the executor
                    // panicked and the state is pending again; loop.
                    if self.is_completed() {
                        return;
                    }
                }
                Err(COMPLETE) => return,
                Err(_) => unreachable!("invalid once state"),
            }
        }
    }

    fn block_while_running(&self) {
        let mut guard = self.lock.lock().expect("once lock poisoned");
        while self.state.load(Ordering::Acquire) == RUNNING {
            guard = self.cvar.wait(guard).expect("once lock poisoned");
        }
        drop(guard);
    }

    fn wake_waiters(&self) {
        // Taking the lock orders the wake after any concurrent waiter's
        // state check, closing the missed-notification window.
        let _guard = self.lock.lock().expect("once lock poisoned");
        self.cvar.notify_all();
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}
