//! Reader/writer lock with writer-preference.
//!
//! Any number of threads may hold the lock in shared mode, or exactly one
//! in exclusive mode, never both. The policy is **writer-preference**: the
//! moment an exclusive request queues, new shared acquisitions wait behind
//! it. This prevents writer starvation under read-heavy load — and it
//! makes one caller mistake a hard deadlock rather than a lucky race:
//! re-acquiring shared mode (directly or through a nested call) while
//! still holding it, with a writer queued in between, blocks the reader
//! behind a writer that is itself blocked on the reader's outer hold.
//! Never hold shared mode across a call that may itself acquire this lock.
//!
//! # Poisoning
//!
//! A panic while holding either guard poisons the lock; subsequent
//! acquisitions report it.
//!
//! # Example
//!
//! ```
//! use synckit::RwLock;
//!
//! let lock = RwLock::new(vec![1, 2, 3]);
//!
//! {
//!     let r1 = lock.read().unwrap();
//!     let r2 = lock.read().unwrap(); // shared mode is concurrent
//!     assert_eq!(r1.len() + r2.len(), 6);
//! }
//!
//! lock.write().unwrap().push(4); // exclusive mode excludes everyone
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex as StdMutex, RwLock as StdRwLock};

/// Error returned when acquiring either mode fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwLockError {
    /// The lock was poisoned (a panic occurred while holding a guard).
    Poisoned,
}

impl std::fmt::Display for RwLockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for RwLockError {}

/// Error returned when trying to acquire shared mode without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryReadError {
    /// Exclusive mode is held, or an exclusive request is queued.
    Locked,
    /// The lock was poisoned.
    Poisoned,
}

impl std::fmt::Display for TryReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "rwlock is write-locked"),
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for TryReadError {}

/// Error returned when trying to acquire exclusive mode without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryWriteError {
    /// The lock is held in either mode.
    Locked,
    /// The lock was poisoned.
    Poisoned,
}

impl std::fmt::Display for TryWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "rwlock is locked"),
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for TryWriteError {}

#[derive(Debug, Default, Clone)]
struct State {
    readers: usize,
    writer_active: bool,
    writer_waiters: usize,
}

/// A reader/writer lock with writer-preference.
///
/// Invariant: `readers > 0` and `writer_active` are never true at the same
/// instant. Release of either mode establishes a happens-before edge
/// visible to the next acquirer.
///
/// `RwLock` is move-only; share through `Arc<RwLock<T>>`.
#[derive(Debug)]
pub struct RwLock<T> {
    state: StdMutex<State>,
    /// Readers park here while a writer is active or queued.
    reader_cv: Condvar,
    /// Writers park here while readers or another writer hold the lock.
    writer_cv: Condvar,
    data: StdRwLock<T>,
    poisoned: AtomicBool,
}

impl<T> RwLock<T> {
    /// Creates an unlocked lock protecting `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            state: StdMutex::new(State::default()),
            reader_cv: Condvar::new(),
            writer_cv: Condvar::new(),
            data: StdRwLock::new(value),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Returns true if a holder panicked while holding a guard.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Acquires shared mode, blocking while a writer is active or queued.
    ///
    /// # Errors
    ///
    /// Returns [`RwLockError::Poisoned`] if a previous holder panicked.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>, RwLockError> {
        self.acquire_read_state()?;
        match self.data.read() {
            Ok(guard) => Ok(RwLockReadGuard { lock: self, guard }),
            Err(inner) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_reader();
                drop(inner.into_inner());
                Err(RwLockError::Poisoned)
            }
        }
    }

    /// Tries to acquire shared mode without blocking.
    ///
    /// # Errors
    ///
    /// Fails with [`TryReadError::Locked`] while a writer is active *or
    /// queued* — writer-preference applies to non-blocking attempts too.
    pub fn try_read(&self) -> Result<RwLockReadGuard<'_, T>, TryReadError> {
        if self.is_poisoned() {
            return Err(TryReadError::Poisoned);
        }
        {
            let mut state = self.state.lock().expect("rwlock state poisoned");
            if state.writer_active || state.writer_waiters > 0 {
                return Err(TryReadError::Locked);
            }
            state.readers += 1;
        }
        match self.data.read() {
            Ok(guard) => Ok(RwLockReadGuard { lock: self, guard }),
            Err(inner) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_reader();
                drop(inner.into_inner());
                Err(TryReadError::Poisoned)
            }
        }
    }

    /// Acquires exclusive mode, blocking until all holders release.
    ///
    /// Queuing here immediately blocks new shared acquisitions.
    ///
    /// # Errors
    ///
    /// Returns [`RwLockError::Poisoned`] if a previous holder panicked.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>, RwLockError> {
        self.acquire_write_state()?;
        match self.data.write() {
            Ok(guard) => Ok(RwLockWriteGuard { lock: self, guard }),
            Err(inner) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_writer();
                drop(inner.into_inner());
                Err(RwLockError::Poisoned)
            }
        }
    }

    /// Tries to acquire exclusive mode without blocking.
    ///
    /// # Errors
    ///
    /// Fails with [`TryWriteError::Locked`] while the lock is held in
    /// either mode.
    pub fn try_write(&self) -> Result<RwLockWriteGuard<'_, T>, TryWriteError> {
        if self.is_poisoned() {
            return Err(TryWriteError::Poisoned);
        }
        {
            let mut state = self.state.lock().expect("rwlock state poisoned");
            if state.writer_active || state.readers > 0 {
                return Err(TryWriteError::Locked);
            }
            state.writer_active = true;
        }
        match self.data.write() {
            Ok(guard) => Ok(RwLockWriteGuard { lock: self, guard }),
            Err(inner) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_writer();
                drop(inner.into_inner());
                Err(TryWriteError::Poisoned)
            }
        }
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn get_mut(&mut self) -> &mut T {
        assert!(!self.is_poisoned(), "rwlock is poisoned");
        self.data.get_mut().expect("inner lock poisoned")
    }

    /// Consumes the lock and returns the protected value.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn into_inner(self) -> T {
        assert!(!self.is_poisoned(), "rwlock is poisoned");
        self.data.into_inner().expect("inner lock poisoned")
    }

    fn acquire_read_state(&self) -> Result<(), RwLockError> {
        if self.is_poisoned() {
            return Err(RwLockError::Poisoned);
        }
        let mut state = self.state.lock().expect("rwlock state poisoned");
        while state.writer_active || state.writer_waiters > 0 {
            if self.is_poisoned() {
                return Err(RwLockError::Poisoned);
            }
            tracing::trace!(
                writer_waiters = state.writer_waiters,
                "read blocked behind writer"
            );
            state = self.reader_cv.wait(state).expect("rwlock state poisoned");
        }
        state.readers += 1;
        Ok(())
    }

    fn acquire_write_state(&self) -> Result<(), RwLockError> {
        if self.is_poisoned() {
            return Err(RwLockError::Poisoned);
        }
        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.writer_waiters += 1;
        while state.writer_active || state.readers > 0 {
            if self.is_poisoned() {
                state.writer_waiters -= 1;
                if state.writer_waiters == 0 && !state.writer_active {
                    self.reader_cv.notify_all();
                }
                return Err(RwLockError::Poisoned);
            }
            tracing::trace!(readers = state.readers, "write blocked");
            state = self.writer_cv.wait(state).expect("rwlock state poisoned");
        }
        state.writer_active = true;
        state.writer_waiters -= 1;
        Ok(())
    }

    fn release_reader(&self) {
        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 && state.writer_waiters > 0 {
            self.writer_cv.notify_one();
        }
    }

    fn release_writer(&self) {
        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.writer_active = false;
        if state.writer_waiters > 0 {
            self.writer_cv.notify_one();
        } else {
            self.reader_cv.notify_all();
        }
    }

    #[cfg(test)]
    fn debug_state(&self) -> State {
        self.state.lock().expect("rwlock state poisoned").clone()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard for shared mode; releases on drop.
#[must_use = "the lock is released immediately if the guard is not held"]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
    guard: std::sync::RwLockReadGuard<'a, T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.lock.poisoned.store(true, Ordering::Release);
        }
        self.lock.release_reader();
    }
}

/// Guard for exclusive mode; releases on drop.
#[must_use = "the lock is released immediately if the guard is not held"]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
    guard: std::sync::RwLockWriteGuard<'a, T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.lock.poisoned.store(true, Ordering::Release);
        }
        self.lock.release_writer();
    }
}
