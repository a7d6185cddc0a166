//! Bounded resource pool with size-aware retention.
//!
//! A [`BoundedPool`] reuses resource instances (buffers, scratch
//! allocations, parser tables) across borrows, constructing on miss
//! through a factory. The defining property is that the pool's *retained*
//! footprint is bounded independently of the largest instance ever
//! borrowed: an unconditional pool fed a mix of very large and very small
//! working sets keeps its largest-ever member alive indefinitely, and the
//! process footprint tracks the high-water mark instead of the
//! steady-state need. Retention here is a policy decision made at release
//! time, never a default.
//!
//! # Retention Policy
//!
//! A released instance re-enters the free-list only if all of these hold:
//!
//! - the instance is not oversized: with a configured
//!   [`typical_size`](PoolConfig::typical_size), instances larger than
//!   `typical_size * oversize_factor` are always discarded;
//! - the free-list is below [`max_idle`](PoolConfig::max_idle) instances;
//! - retained bytes stay within
//!   [`max_retained_bytes`](PoolConfig::max_retained_bytes).
//!
//! Otherwise the instance is dropped and the next miss reconstructs.
//!
//! # Obligation Contract
//!
//! [`borrow`](BoundedPool::borrow) hands out a [`Pooled`] guard; dropping
//! it returns the instance through an internal channel, and an explicit
//! [`discard`](Pooled::discard) removes a broken instance instead. The
//! return obligation discharges exactly once, so a double return cannot
//! occur. Ownership of the guard is exclusive: the pool can never hand one
//! live instance to two borrowers.
//!
//! # Memory Pressure
//!
//! [`evict_all`](BoundedPool::evict_all) drops every retained instance —
//! an external collector-style signal. Eviction has no correctness impact,
//! only reconstruction cost on the next miss.
//!
//! # Example
//!
//! ```
//! use synckit::{BoundedPool, PoolConfig};
//!
//! let pool = BoundedPool::new(
//!     || Ok(Vec::<u8>::with_capacity(1024)),
//!     PoolConfig::with_max_idle(4).typical_size(1024),
//! );
//!
//! let mut buf = pool.borrow().unwrap();
//! buf.extend_from_slice(b"scratch");
//! drop(buf); // returned and retained: within every bound
//! assert_eq!(pool.stats().retained, 1);
//! ```

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Mutex as StdMutex;

/// Size measure used by the retention policy.
///
/// Implementations report the instance's retained memory footprint in
/// bytes — capacity, not length, for growable containers, since capacity
/// is what retention keeps alive.
pub trait Footprint {
    /// Returns the instance's footprint in bytes.
    fn footprint(&self) -> usize;
}

impl<T> Footprint for Vec<T> {
    fn footprint(&self) -> usize {
        self.capacity() * std::mem::size_of::<T>()
    }
}

impl Footprint for String {
    fn footprint(&self) -> usize {
        self.capacity()
    }
}

impl<T: Footprint> Footprint for Box<T> {
    fn footprint(&self) -> usize {
        (**self).footprint()
    }
}

/// Sender used by guards to return instances to their pool.
pub type PoolReturnSender<R> = mpsc::Sender<PoolReturn<R>>;

/// Receiver draining returned instances inside the pool.
pub type PoolReturnReceiver<R> = mpsc::Receiver<PoolReturn<R>>;

/// Return messages sent from a [`Pooled`] guard back to the pool.
#[derive(Debug)]
pub enum PoolReturn<R> {
    /// Instance is intact; apply the retention policy.
    Return(R),
    /// Instance is broken; account for it but never retain.
    Discard,
}

/// Configuration for a bounded pool.
///
/// The defaults retain up to 8 instances with no byte ceiling and no
/// size-class split; every bound can be tightened independently.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of retained (idle) instances.
    pub max_idle: usize,
    /// Ceiling on the summed footprint of retained instances, in bytes.
    pub max_retained_bytes: usize,
    /// Typical borrowed size; enables the size-class split when set.
    pub typical_size: Option<usize>,
    /// Multiple of `typical_size` above which an instance is never
    /// retained.
    pub oversize_factor: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 8,
            max_retained_bytes: usize::MAX,
            typical_size: None,
            oversize_factor: 2,
        }
    }
}

impl PoolConfig {
    /// Creates a configuration with the given instance-count ceiling.
    #[must_use]
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            max_idle,
            ..Self::default()
        }
    }

    /// Sets the instance-count ceiling.
    #[must_use]
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets the retained-bytes ceiling.
    #[must_use]
    pub fn max_retained_bytes(mut self, bytes: usize) -> Self {
        self.max_retained_bytes = bytes;
        self
    }

    /// Sets the typical borrowed size, enabling the size-class split.
    #[must_use]
    pub fn typical_size(mut self, bytes: usize) -> Self {
        self.typical_size = Some(bytes);
        self
    }

    /// Sets the oversize multiple for the size-class split.
    #[must_use]
    pub fn oversize_factor(mut self, factor: usize) -> Self {
        self.oversize_factor = factor;
        self
    }

    /// Largest footprint the size-class split will retain, if enabled.
    #[must_use]
    pub fn oversize_limit(&self) -> Option<usize> {
        self.typical_size
            .map(|typical| typical.saturating_mul(self.oversize_factor))
    }
}

/// Error type for pool operations.
#[derive(Debug)]
pub enum PoolError {
    /// The factory failed to construct a new instance.
    Factory(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory(e) => write!(f, "resource construction failed: {e}"),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Factory(e) => Some(e.as_ref()),
        }
    }
}

/// Pool usage snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances currently retained in the free-list.
    pub retained: usize,
    /// Summed footprint of retained instances, in bytes.
    pub retained_bytes: usize,
    /// Instances currently out on loan.
    pub borrowed: usize,
    /// Borrows served since creation.
    pub total_borrows: u64,
    /// Borrows that constructed a fresh instance.
    pub misses: u64,
    /// Releases refused retention (policy) plus explicit discards.
    pub discarded: u64,
}

#[derive(Debug)]
struct ReturnObligation {
    discharged: bool,
}

impl ReturnObligation {
    fn new() -> Self {
        Self { discharged: false }
    }

    fn discharge(&mut self) {
        self.discharged = true;
    }

    fn is_discharged(&self) -> bool {
        self.discharged
    }
}

/// An instance on loan from a [`BoundedPool`].
///
/// Dropping the guard returns the instance to the pool; the retention
/// policy decides whether it is kept. The return obligation discharges
/// exactly once across drop, [`return_to_pool`](Pooled::return_to_pool),
/// and [`discard`](Pooled::discard).
#[must_use = "a pooled instance is returned to the pool when dropped"]
pub struct Pooled<R> {
    resource: Option<R>,
    obligation: ReturnObligation,
    return_tx: PoolReturnSender<R>,
}

impl<R> Pooled<R> {
    /// Wraps a resource with a return obligation on the given channel.
    ///
    /// Exposed so custom pool implementations can reuse the guard
    /// machinery.
    pub fn new(resource: R, return_tx: PoolReturnSender<R>) -> Self {
        Self {
            resource: Some(resource),
            obligation: ReturnObligation::new(),
            return_tx,
        }
    }

    /// Accesses the instance.
    #[must_use]
    pub fn get(&self) -> &R {
        self.resource.as_ref().expect("resource taken")
    }

    /// Mutably accesses the instance.
    pub fn get_mut(&mut self) -> &mut R {
        self.resource.as_mut().expect("resource taken")
    }

    /// Explicitly returns the instance, discharging the obligation.
    ///
    /// Equivalent to dropping the guard; the explicit form reads better
    /// at the end of a borrow scope.
    pub fn return_to_pool(mut self) {
        self.return_inner();
    }

    /// Marks the instance broken and drops it without retention.
    ///
    /// The pool reconstructs on a later miss.
    pub fn discard(mut self) {
        self.discard_inner();
    }

    fn return_inner(&mut self) {
        if self.obligation.is_discharged() {
            return;
        }
        if let Some(resource) = self.resource.take() {
            let _ = self.return_tx.send(PoolReturn::Return(resource));
        }
        self.obligation.discharge();
    }

    fn discard_inner(&mut self) {
        if self.obligation.is_discharged() {
            return;
        }
        self.resource.take();
        let _ = self.return_tx.send(PoolReturn::Discard);
        self.obligation.discharge();
    }
}

impl<R> Drop for Pooled<R> {
    fn drop(&mut self) {
        self.return_inner();
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Pooled<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled").field("resource", &self.resource).finish()
    }
}

impl<R> std::ops::Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<R> std::ops::DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

#[derive(Debug)]
struct PoolState<R> {
    /// Free-list, oldest first.
    idle: VecDeque<R>,
    retained_bytes: usize,
    borrowed: usize,
    total_borrows: u64,
    misses: u64,
    discarded: u64,
}

/// A pool with a bounded retained footprint.
///
/// Borrowing never blocks and never fails except on factory error: the
/// bounds govern what the pool *keeps*, not how many instances are
/// simultaneously on loan.
///
/// `BoundedPool` is move-only; share through `Arc`.
pub struct BoundedPool<R, F>
where
    R: Footprint + Send + 'static,
    F: Fn() -> Result<R, Box<dyn std::error::Error + Send + Sync>> + Send + Sync,
{
    factory: F,
    config: PoolConfig,
    state: StdMutex<PoolState<R>>,
    return_tx: PoolReturnSender<R>,
    return_rx: StdMutex<PoolReturnReceiver<R>>,
}

impl<R, F> BoundedPool<R, F>
where
    R: Footprint + Send + 'static,
    F: Fn() -> Result<R, Box<dyn std::error::Error + Send + Sync>> + Send + Sync,
{
    /// Creates a pool with the given factory and configuration.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let (return_tx, return_rx) = mpsc::channel();
        Self {
            factory,
            config,
            state: StdMutex::new(PoolState {
                idle: VecDeque::new(),
                retained_bytes: 0,
                borrowed: 0,
                total_borrows: 0,
                misses: 0,
                discarded: 0,
            }),
            return_tx,
            return_rx: StdMutex::new(return_rx),
        }
    }

    /// Creates a pool with the default configuration.
    pub fn with_factory(factory: F) -> Self {
        Self::new(factory, PoolConfig::default())
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Borrows an instance, constructing through the factory on miss.
    ///
    /// # Errors
    ///
    /// Propagates factory failure as [`PoolError::Factory`]; the borrower
    /// never receives an invalid instance.
    pub fn borrow(&self) -> Result<Pooled<R>, PoolError> {
        self.process_returns();

        {
            let mut state = self.state.lock().expect("pool state poisoned");
            if let Some(resource) = state.idle.pop_front() {
                state.retained_bytes -= resource.footprint();
                state.borrowed += 1;
                state.total_borrows += 1;
                return Ok(Pooled::new(resource, self.return_tx.clone()));
            }
        }

        let resource = (self.factory)().map_err(PoolError::Factory)?;
        let mut state = self.state.lock().expect("pool state poisoned");
        state.borrowed += 1;
        state.total_borrows += 1;
        state.misses += 1;
        tracing::trace!(footprint = resource.footprint(), "pool miss, constructed");
        Ok(Pooled::new(resource, self.return_tx.clone()))
    }

    /// Borrows a retained instance if one exists; never constructs.
    pub fn try_borrow(&self) -> Option<Pooled<R>> {
        self.process_returns();

        let mut state = self.state.lock().expect("pool state poisoned");
        let resource = state.idle.pop_front()?;
        state.retained_bytes -= resource.footprint();
        state.borrowed += 1;
        state.total_borrows += 1;
        Some(Pooled::new(resource, self.return_tx.clone()))
    }

    /// Drops every retained instance (external memory-pressure signal).
    ///
    /// Instances currently on loan are unaffected; their release still
    /// goes through the retention policy.
    pub fn evict_all(&self) {
        self.process_returns();

        let mut state = self.state.lock().expect("pool state poisoned");
        let evicted = state.idle.len();
        let bytes = state.retained_bytes;
        state.idle.clear();
        state.retained_bytes = 0;
        if evicted > 0 {
            tracing::trace!(evicted, bytes, "pool evicted all retained instances");
        }
    }

    /// Returns a usage snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.process_returns();

        let state = self.state.lock().expect("pool state poisoned");
        PoolStats {
            retained: state.idle.len(),
            retained_bytes: state.retained_bytes,
            borrowed: state.borrowed,
            total_borrows: state.total_borrows,
            misses: state.misses,
            discarded: state.discarded,
        }
    }

    /// Drains the return channel, applying the retention policy to each
    /// returned instance.
    fn process_returns(&self) {
        let rx = self.return_rx.lock().expect("pool return channel poisoned");
        while let Ok(message) = rx.try_recv() {
            let mut state = self.state.lock().expect("pool state poisoned");
            state.borrowed = state.borrowed.saturating_sub(1);
            match message {
                PoolReturn::Return(resource) => {
                    let size = resource.footprint();
                    if self.should_retain(&state, size) {
                        state.retained_bytes += size;
                        state.idle.push_back(resource);
                    } else {
                        state.discarded += 1;
                        tracing::trace!(footprint = size, "release refused retention");
                    }
                }
                PoolReturn::Discard => {
                    state.discarded += 1;
                }
            }
        }
    }

    fn should_retain(&self, state: &PoolState<R>, size: usize) -> bool {
        if let Some(limit) = self.config.oversize_limit() {
            if size > limit {
                return false;
            }
        }
        if state.idle.len() >= self.config.max_idle {
            return false;
        }
        state.retained_bytes.saturating_add(size) <= self.config.max_retained_bytes
    }
}

impl<R, F> std::fmt::Debug for BoundedPool<R, F>
where
    R: Footprint + Send + 'static,
    F: Fn() -> Result<R, Box<dyn std::error::Error + Send + Sync>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedPool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn byte_factory(
        size: usize,
    ) -> impl Fn() -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        move || Ok(Vec::with_capacity(size))
    }

    #[test]
    fn config_defaults_and_builder() {
        init_test("config_defaults_and_builder");
        let config = PoolConfig::default();
        crate::assert_with_log!(config.max_idle == 8, "max_idle", 8usize, config.max_idle);
        crate::assert_with_log!(
            config.oversize_limit().is_none(),
            "no size class by default",
            true,
            config.oversize_limit().is_none()
        );

        let config = PoolConfig::with_max_idle(4)
            .max_retained_bytes(1 << 20)
            .typical_size(1024)
            .oversize_factor(2);
        crate::assert_with_log!(
            config.oversize_limit() == Some(2048),
            "oversize limit",
            2048usize,
            config.oversize_limit().unwrap_or(0)
        );
        crate::test_complete!("config_defaults_and_builder");
    }

    #[test]
    fn borrow_constructs_on_miss_and_reuses_on_hit() {
        init_test("borrow_constructs_on_miss_and_reuses_on_hit");
        let pool = BoundedPool::new(byte_factory(64), PoolConfig::with_max_idle(2));

        let first = pool.borrow().expect("borrow");
        let stats = pool.stats();
        crate::assert_with_log!(stats.misses == 1, "first borrow misses", 1u64, stats.misses);
        first.return_to_pool();

        let _second = pool.borrow().expect("borrow");
        let stats = pool.stats();
        crate::assert_with_log!(stats.misses == 1, "second borrow hits", 1u64, stats.misses);
        crate::assert_with_log!(
            stats.total_borrows == 2,
            "two borrows",
            2u64,
            stats.total_borrows
        );
        crate::test_complete!("borrow_constructs_on_miss_and_reuses_on_hit");
    }

    #[test]
    fn drop_returns_instance() {
        init_test("drop_returns_instance");
        let pool = BoundedPool::new(byte_factory(64), PoolConfig::with_max_idle(2));
        {
            let _guard = pool.borrow().expect("borrow");
        }
        let stats = pool.stats();
        crate::assert_with_log!(stats.retained == 1, "retained after drop", 1usize, stats.retained);
        crate::assert_with_log!(stats.borrowed == 0, "no outstanding", 0usize, stats.borrowed);
        crate::test_complete!("drop_returns_instance");
    }

    #[test]
    fn discard_never_retains() {
        init_test("discard_never_retains");
        let pool = BoundedPool::new(byte_factory(64), PoolConfig::with_max_idle(2));
        let guard = pool.borrow().expect("borrow");
        guard.discard();
        let stats = pool.stats();
        crate::assert_with_log!(stats.retained == 0, "nothing retained", 0usize, stats.retained);
        crate::assert_with_log!(stats.discarded == 1, "one discard", 1u64, stats.discarded);
        crate::test_complete!("discard_never_retains");
    }

    #[test]
    fn oversized_release_is_not_retained() {
        init_test("oversized_release_is_not_retained");
        let pool = BoundedPool::new(
            byte_factory(1024),
            PoolConfig::with_max_idle(4).typical_size(1024).oversize_factor(2),
        );

        let mut guard = pool.borrow().expect("borrow");
        guard.reserve(1 << 20); // grow far past the size class
        drop(guard);

        let stats = pool.stats();
        crate::assert_with_log!(stats.retained == 0, "oversized refused", 0usize, stats.retained);
        crate::assert_with_log!(stats.discarded == 1, "counted", 1u64, stats.discarded);
        crate::test_complete!("oversized_release_is_not_retained");
    }

    #[test]
    fn instance_count_ceiling_holds() {
        init_test("instance_count_ceiling_holds");
        let pool = BoundedPool::new(byte_factory(16), PoolConfig::with_max_idle(4));

        let guards: Vec<_> = (0..10).map(|_| pool.borrow().expect("borrow")).collect();
        drop(guards);

        let stats = pool.stats();
        crate::assert_with_log!(stats.retained <= 4, "ceiling held", 4usize, stats.retained);
        crate::assert_with_log!(
            stats.discarded >= 6,
            "excess discarded",
            6u64,
            stats.discarded
        );
        crate::test_complete!("instance_count_ceiling_holds");
    }

    #[test]
    fn byte_ceiling_holds() {
        init_test("byte_ceiling_holds");
        let pool = BoundedPool::new(
            byte_factory(1024),
            PoolConfig::with_max_idle(100).max_retained_bytes(3 * 1024),
        );

        let guards: Vec<_> = (0..8).map(|_| pool.borrow().expect("borrow")).collect();
        drop(guards);

        let stats = pool.stats();
        crate::assert_with_log!(
            stats.retained_bytes <= 3 * 1024,
            "byte ceiling held",
            3 * 1024usize,
            stats.retained_bytes
        );
        crate::test_complete!("byte_ceiling_holds");
    }

    #[test]
    fn evict_all_clears_retention() {
        init_test("evict_all_clears_retention");
        let pool = BoundedPool::new(byte_factory(64), PoolConfig::with_max_idle(4));
        for _ in 0..3 {
            drop(pool.borrow().expect("borrow"));
        }
        let before = pool.stats();
        crate::assert_with_log!(before.retained > 0, "retained before", true, before.retained > 0);

        pool.evict_all();
        let after = pool.stats();
        crate::assert_with_log!(after.retained == 0, "retained after", 0usize, after.retained);
        crate::assert_with_log!(
            after.retained_bytes == 0,
            "bytes after",
            0usize,
            after.retained_bytes
        );

        // Borrowing after eviction simply reconstructs.
        let guard = pool.borrow().expect("borrow after eviction");
        crate::assert_with_log!(guard.capacity() >= 64, "reconstructed", true, guard.capacity() >= 64);
        crate::test_complete!("evict_all_clears_retention");
    }

    #[test]
    fn factory_failure_propagates() {
        init_test("factory_failure_propagates");
        let pool: BoundedPool<Vec<u8>, _> = BoundedPool::new(
            || Err("allocation refused".into()),
            PoolConfig::default(),
        );
        let err = pool.borrow().expect_err("factory must fail");
        let message = err.to_string();
        crate::assert_with_log!(
            message.contains("resource construction failed"),
            "typed failure",
            "resource construction failed: allocation refused",
            message
        );
        crate::assert_with_log!(
            std::error::Error::source(&err).is_some(),
            "source chain",
            true,
            std::error::Error::source(&err).is_some()
        );
        crate::test_complete!("factory_failure_propagates");
    }

    #[test]
    fn explicit_return_discharges_once() {
        init_test("explicit_return_discharges_once");
        let (tx, rx) = mpsc::channel();
        let pooled = Pooled::new(vec![0u8; 4], tx);
        pooled.return_to_pool();

        let first = rx.recv().expect("one return message");
        assert!(matches!(first, PoolReturn::Return(_)));
        let empty = rx.try_recv().is_err();
        crate::assert_with_log!(empty, "no double return", true, empty);
        crate::test_complete!("explicit_return_discharges_once");
    }

    #[test]
    fn try_borrow_never_constructs() {
        init_test("try_borrow_never_constructs");
        let pool = BoundedPool::new(byte_factory(64), PoolConfig::default());
        let miss = pool.try_borrow();
        crate::assert_with_log!(miss.is_none(), "empty pool yields none", true, miss.is_none());

        drop(pool.borrow().expect("borrow"));
        let hit = pool.try_borrow();
        crate::assert_with_log!(hit.is_some(), "retained instance served", true, hit.is_some());
        crate::test_complete!("try_borrow_never_constructs");
    }

    #[test]
    fn footprint_impls() {
        init_test("footprint_impls");
        let v: Vec<u64> = Vec::with_capacity(8);
        crate::assert_with_log!(v.footprint() == 64, "vec footprint", 64usize, v.footprint());
        let s = String::with_capacity(32);
        crate::assert_with_log!(s.footprint() == 32, "string footprint", 32usize, s.footprint());
        crate::test_complete!("footprint_impls");
    }
}
