//! Blocking synchronization primitives.
//!
//! Every primitive in this module hands out its resource through a scoped
//! guard: acquisition blocks, the guard is the proof of the hold, and drop
//! is the release. Release covers all exit paths, including early return
//! and unwinding, so a hold can never outlive its scope by accident and a
//! release without a hold cannot be expressed.
//!
//! # Primitives
//!
//! - [`Mutex`]: mutual exclusion with guard-scoped release
//! - [`RwLock`]: shared/exclusive access with writer-preference
//! - [`WaitGroup`]: completion counting (add/done/wait)
//! - [`Once`]: exactly-once execution
//! - [`BoundedPool`]: bounded resource reuse with size-aware retention
//!
//! # Contracts
//!
//! The locks are non-reentrant. A context that blocks on a lock it already
//! holds deadlocks against itself; no primitive here detects that. The
//! types do not implement `Clone`, so a held lock cannot be duplicated into
//! an independent, out-of-sync instance — share through `Arc` or a
//! reference instead.

mod mutex;
mod once;
mod pool;
mod rwlock;
mod wait_group;

pub use mutex::{LockError, Mutex, MutexGuard, TryLockError};
pub use once::Once;
pub use pool::{
    BoundedPool, Footprint, PoolConfig, PoolError, PoolReturn, PoolReturnReceiver,
    PoolReturnSender, PoolStats, Pooled,
};
pub use rwlock::{
    RwLock, RwLockError, RwLockReadGuard, RwLockWriteGuard, TryReadError, TryWriteError,
};
pub use wait_group::WaitGroup;
