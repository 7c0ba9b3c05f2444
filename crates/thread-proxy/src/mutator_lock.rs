//! The shared/exclusive mutator lock contract.
//!
//! A running mutator holds the lock shared; a collector that needs every
//! mutator stopped takes it exclusively. This crate never implements the
//! lock's fairness policy, it only drives acquisition and release around
//! status transitions. The lock is held across calls (from the moment a
//! thread enters `Running` until it leaves), so the contract is a raw
//! acquire/release pair rather than a guard.

use parking_lot::lock_api::RawRwLock as _;

/// Raw shared/exclusive lock consumed by the suspension protocol.
///
/// Releasing is `unsafe`: a stray release would unlock a hold that belongs
/// to another thread.
///
/// ```compile_fail
/// use thread_proxy::{new_mutator_lock, MutatorLock};
///
/// let lock = new_mutator_lock();
/// lock.release_shared();
/// ```
pub trait MutatorLock: Send + Sync {
    /// Block until the shared side is held.
    fn acquire_shared(&self);

    /// Release a shared hold taken by the current thread.
    ///
    /// # Safety
    ///
    /// The current thread must hold the shared side, acquired through
    /// [`acquire_shared`](Self::acquire_shared) and not yet released.
    unsafe fn release_shared(&self);

    /// Block until the exclusive side is held.
    fn acquire_exclusive(&self);

    /// Release the exclusive hold taken by the current thread.
    ///
    /// # Safety
    ///
    /// The current thread must hold the exclusive side, acquired through
    /// [`acquire_exclusive`](Self::acquire_exclusive) and not yet released.
    unsafe fn release_exclusive(&self);
}

impl MutatorLock for parking_lot::RawRwLock {
    #[inline]
    fn acquire_shared(&self) {
        self.lock_shared();
    }

    #[inline]
    unsafe fn release_shared(&self) {
        // SAFETY: the caller holds a shared lock.
        unsafe { self.unlock_shared() };
    }

    #[inline]
    fn acquire_exclusive(&self) {
        self.lock_exclusive();
    }

    #[inline]
    unsafe fn release_exclusive(&self) {
        // SAFETY: the caller holds the exclusive lock.
        unsafe { self.unlock_exclusive() };
    }
}

/// Create an unlocked `parking_lot` mutator lock.
#[must_use]
pub const fn new_mutator_lock() -> parking_lot::RawRwLock {
    <parking_lot::RawRwLock as parking_lot::lock_api::RawRwLock>::INIT
}
