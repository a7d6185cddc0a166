//! Synckit: blocking synchronization primitives with strict contracts.
//!
//! # Overview
//!
//! Synckit provides a small toolkit of thread-blocking synchronization
//! primitives built on the principle that every demonstrated misuse of a
//! primitive should be either impossible to express or loudly attributable
//! to the caller. Locks release through scoped guards, so a release without
//! a hold cannot be written. Synchronization objects are move-only, so a
//! copy of a held lock cannot be created. Failure modes that remain
//! (re-entrant acquisition, mismatched counter accounting) are documented
//! contracts, reproduced in tests rather than silently tolerated.
//!
//! # Primitives
//!
//! - [`Mutex`]: non-reentrant mutual exclusion with FIFO handoff
//! - [`RwLock`]: reader/writer lock with writer-preference
//! - [`WaitGroup`]: completion counter (add/done/wait)
//! - [`Once`]: exactly-once execution with full visibility
//! - [`BoundedPool`]: resource reuse with a bounded retained footprint
//!
//! The primitives are scheduler-agnostic: they assume nothing about how
//! execution contexts are scheduled, only that a blocked thread is
//! eventually run again. None of them offers cancellation or timeouts;
//! callers needing bounded waiting compose an external mechanism.
//!
//! # Module Structure
//!
//! - [`sync`]: the primitive toolkit
//! - [`test_utils`]: tracing-based test logging and watchdog helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]

pub mod sync;
pub mod test_utils;

pub use sync::{
    BoundedPool, Footprint, LockError, Mutex, MutexGuard, Once, PoolConfig, PoolError, PoolStats,
    Pooled, RwLock, RwLockError, RwLockReadGuard, RwLockWriteGuard, TryLockError, TryReadError,
    TryWriteError, WaitGroup,
};
