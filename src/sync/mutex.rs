//! Non-reentrant mutex with guard-scoped release.
//!
//! The lock hands out a [`MutexGuard`] that releases on drop, covering
//! every exit path including unwinding. Waiters are serviced in FIFO
//! order.
//!
//! # Non-Reentrancy
//!
//! The mutex does not track holder identity. A thread that calls
//! [`Mutex::lock`] while already holding the guard blocks on itself
//! permanently — the classic nested-call deadlock where an inner function
//! implicitly expects to reacquire a lock held up-stack. Keep critical
//! sections small and never call code that may take the same lock while
//! the guard is live.
//!
//! # Poisoning
//!
//! A panic while holding the guard poisons the mutex. Subsequent
//! acquisitions report [`LockError::Poisoned`] rather than exposing state
//! that a failed critical section may have left half-written.
//!
//! # Example
//!
//! ```
//! use synckit::Mutex;
//!
//! let mutex = Mutex::new(41);
//! {
//!     let mut guard = mutex.lock().unwrap();
//!     *guard += 1;
//! } // guard dropped, lock released
//! assert_eq!(*mutex.lock().unwrap(), 42);
//! ```

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex as StdMutex, RwLock as StdRwLock};

/// Error returned when acquiring the mutex fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// The mutex was poisoned (a panic occurred while holding the lock).
    Poisoned,
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poisoned => write!(f, "mutex poisoned"),
        }
    }
}

impl std::error::Error for LockError {}

/// Error returned when trying to lock without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockError {
    /// The mutex is currently locked or has queued waiters.
    Locked,
    /// The mutex was poisoned.
    Poisoned,
}

impl std::fmt::Display for TryLockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "mutex is locked"),
            Self::Poisoned => write!(f, "mutex poisoned"),
        }
    }
}

impl std::error::Error for TryLockError {}

#[derive(Debug)]
struct MutexState {
    /// Whether the mutex is currently held.
    locked: bool,
    /// Queue of waiters (unique IDs), front is next to acquire.
    waiters: VecDeque<u64>,
    /// Monotonic counter for waiter identity.
    next_waiter_id: u64,
}

/// A non-reentrant mutex protecting a value of type `T`.
///
/// At most one thread holds the lock at a time; release of the lock
/// establishes a happens-before edge visible to the next acquirer.
///
/// # Fairness
///
/// FIFO: blocked waiters acquire in arrival order, and `try_lock` refuses
/// to barge past a non-empty queue.
///
/// # Sharing
///
/// `Mutex` is move-only. Duplicating a lock's synchronization state into
/// an independent instance while it is held would produce a second
/// "already locked" object no thread can ever release, so there is no
/// `Clone`; share through `Arc<Mutex<T>>`.
///
/// To guard state that lives outside the lock (the bare acquire/release
/// model), use `Mutex<()>`.
#[derive(Debug)]
pub struct Mutex<T> {
    /// Protected value. The outer state machine enforces exclusion; this
    /// inner lock only brokers safe references and is never contended.
    data: StdRwLock<T>,
    /// Set when a holder panicked.
    poisoned: AtomicBool,
    state: StdMutex<MutexState>,
    cvar: Condvar,
}

impl<T> Mutex<T> {
    /// Creates an unlocked mutex protecting `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            data: StdRwLock::new(value),
            poisoned: AtomicBool::new(false),
            state: StdMutex::new(MutexState {
                locked: false,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Returns true if the mutex is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().expect("mutex state poisoned").locked
    }

    /// Returns true if a holder panicked while holding the lock.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Returns the number of threads blocked waiting for the lock.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().expect("mutex state poisoned").waiters.len()
    }

    /// Acquires the mutex, blocking the calling thread until it is free.
    ///
    /// Non-reentrant: calling `lock` while already holding the guard on
    /// the same thread blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] if a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, LockError> {
        if self.is_poisoned() {
            return Err(LockError::Poisoned);
        }

        let mut state = self.state.lock().expect("mutex state poisoned");
        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        state.waiters.push_back(id);

        if state.locked || state.waiters.front() != Some(&id) {
            tracing::trace!(waiter = id, "mutex contended, blocking");
        }
        loop {
            if self.is_poisoned() {
                if let Some(pos) = state.waiters.iter().position(|&w| w == id) {
                    state.waiters.remove(pos);
                }
                return Err(LockError::Poisoned);
            }
            if !state.locked && state.waiters.front() == Some(&id) {
                state.locked = true;
                state.waiters.pop_front();
                break;
            }
            state = self.cvar.wait(state).expect("mutex state poisoned");
        }
        drop(state);

        let guard = self.data.write().expect("inner lock poisoned");
        Ok(MutexGuard { mutex: self, guard })
    }

    /// Tries to acquire the mutex without blocking.
    ///
    /// Fails when the lock is held, or when waiters are queued — barging
    /// past the queue would break FIFO ordering.
    ///
    /// # Errors
    ///
    /// Returns [`TryLockError::Locked`] when unavailable and
    /// [`TryLockError::Poisoned`] if a previous holder panicked.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, TryLockError> {
        if self.is_poisoned() {
            return Err(TryLockError::Poisoned);
        }

        let mut state = self.state.lock().expect("mutex state poisoned");
        if state.locked || !state.waiters.is_empty() {
            return Err(TryLockError::Locked);
        }
        state.locked = true;
        drop(state);

        let guard = self.data.write().expect("inner lock poisoned");
        Ok(MutexGuard { mutex: self, guard })
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// Exclusive (`&mut`) access to the mutex proves no guard exists, so
    /// no locking takes place.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn get_mut(&mut self) -> &mut T {
        assert!(!self.is_poisoned(), "mutex is poisoned");
        self.data.get_mut().expect("inner lock poisoned")
    }

    /// Consumes the mutex and returns the protected value.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn into_inner(self) -> T {
        assert!(!self.is_poisoned(), "mutex is poisoned");
        self.data.into_inner().expect("inner lock poisoned")
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
        tracing::trace!("mutex poisoned by panicking holder");
    }

    /// Called by `MutexGuard::drop`.
    fn unlock(&self) {
        let mut state = self.state.lock().expect("mutex state poisoned");
        state.locked = false;
        // FIFO handoff: wake everyone, only the queue front proceeds.
        self.cvar.notify_all();
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Scoped guard that releases the mutex when dropped.
///
/// Holding the guard is the proof of the hold; dropping it is the only
/// release path, so releasing a lock the caller does not hold is
/// unrepresentable.
#[must_use = "the lock is released immediately if the guard is not held"]
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    guard: std::sync::RwLockWriteGuard<'a, T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexGuard").field("data", &*self.guard).finish()
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.mutex.poison();
        }
        self.mutex.unlock();
    }
}
