//! Completion counter: add work, signal completion, wait for zero.
//!
//! A producer calls [`WaitGroup::add`] with the number of units it is
//! about to spawn; each unit calls [`WaitGroup::done`] when it finishes;
//! [`WaitGroup::wait`] blocks until the counter reaches zero. The final
//! `done` establishes a happens-before edge to every `wait` return, so a
//! waiter observes all effects of the completed units.
//!
//! # Accounting Contract
//!
//! All `add` calls establishing a wave's total must complete before any
//! corresponding `done` is issued — the conventional shape is one `add(n)`
//! before spawning n units. Calling `add` from inside a unit after the
//! counter may already have touched zero, concurrently with an in-flight
//! `wait`, is a race: the waiter may return before the late-added work
//! completes, or observe the group as never finishing. That overlap is
//! undefined; reuse the group for a new wave only after quiescence (the
//! counter at zero and no waiters pending).
//!
//! Driving the counter below zero panics.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use synckit::WaitGroup;
//!
//! let wg = Arc::new(WaitGroup::new());
//! wg.add(3);
//! for _ in 0..3 {
//!     let wg = Arc::clone(&wg);
//!     std::thread::spawn(move || {
//!         // ... work ...
//!         wg.done();
//!     });
//! }
//! wg.wait(); // returns only after all three done() calls
//! ```

use std::sync::{Condvar, Mutex as StdMutex};

#[derive(Debug)]
struct WaitGroupState {
    count: i64,
    waiters: usize,
}

/// A counting completion barrier.
///
/// Created at zero. `WaitGroup` is move-only; share through
/// `Arc<WaitGroup>` rather than by duplication.
#[derive(Debug)]
pub struct WaitGroup {
    state: StdMutex<WaitGroupState>,
    cvar: Condvar,
}

impl WaitGroup {
    /// Creates a wait group with the counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(WaitGroupState {
                count: 0,
                waiters: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Adjusts the counter by `delta`.
    ///
    /// Positive deltas register upcoming work and must precede the
    /// corresponding `done` calls. When an adjustment brings the counter
    /// to exactly zero, all current waiters release together.
    ///
    /// # Panics
    ///
    /// Panics if the adjustment drives the counter below zero — mismatched
    /// accounting fails loudly rather than corrupting the wave.
    pub fn add(&self, delta: i64) {
        let mut state = self.state.lock().expect("wait group state poisoned");
        state.count += delta;
        assert!(
            state.count >= 0,
            "wait group counter went negative ({})",
            state.count
        );
        if state.count == 0 && state.waiters > 0 {
            tracing::trace!(waiters = state.waiters, "wait group reached zero");
            self.cvar.notify_all();
        }
    }

    /// Signals completion of one unit of work; equivalent to `add(-1)`.
    ///
    /// The decrement that reaches zero releases all current and future
    /// waiters.
    ///
    /// # Panics
    ///
    /// Panics if called more times than work was added.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Blocks the calling thread until the counter reaches zero.
    ///
    /// Returns immediately if the counter is already zero. Multiple
    /// concurrent waiters all release together.
    pub fn wait(&self) {
        let mut state = self.state.lock().expect("wait group state poisoned");
        if state.count == 0 {
            return;
        }
        state.waiters += 1;
        tracing::trace!(count = state.count, "wait group blocking");
        while state.count > 0 {
            state = self.cvar.wait(state).expect("wait group state poisoned");
        }
        state.waiters -= 1;
    }

    /// Returns the current counter value.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.state.lock().expect("wait group state poisoned").count
    }

    /// Returns the number of threads currently blocked in [`wait`].
    ///
    /// A group is quiescent — safe to reuse for a new wave — when the
    /// counter is zero and this is zero.
    ///
    /// [`wait`]: WaitGroup::wait
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().expect("wait group state poisoned").waiters
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}
