//! # Lock Ordering Discipline
//!
//! Two locks take part in suspension and they must always be acquired in
//! the same order, or a mutator and a collector can deadlock each other.
//!
//! | Level | Lock          | Description                                    |
//! |-------|---------------|------------------------------------------------|
//! | 1     | `MutatorLock` | Shared by running mutators, exclusive for STW  |
//! | 2     | `SuspendLock` | Per-thread suspend counter and its condvar     |
//!
//! ## Rules
//!
//! 1. **Increasing Order**: a lock may only be acquired if its level is at
//!    least the highest level already held by the current thread.
//! 2. **Short Suspend Lock**: the suspend lock is held for an O(1) counter
//!    update or across the condvar wait, never across a mutator-lock
//!    acquisition or a safepoint-handler call.
//!
//! ## Validation
//!
//! In debug builds:
//!
//! - `acquire_lock(tag)`: called before blocking on a lock
//! - `LockGuard::new(tag)`: RAII record of a held lock
//!
//! ```
//! use thread_proxy::sync::{acquire_lock, LockGuard, LockOrder};
//!
//! acquire_lock(LockOrder::MutatorLock);
//! let _suspend = LockGuard::new(LockOrder::SuspendLock);
//! // Taking the mutator lock here would panic in debug builds.
//! ```

use std::cell::{Cell, RefCell};

const MAX_LOCK_DEPTH: usize = 8;

struct LockOrderState {
    stack: RefCell<Vec<u8>>,
    is_shutdown: Cell<bool>,
}

thread_local!(static LOCK_ORDER_STATE: LockOrderState = LockOrderState {
    stack: RefCell::new(Vec::with_capacity(MAX_LOCK_DEPTH)),
    is_shutdown: Cell::new(false),
});

/// Lock order tags for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockOrder {
    /// The runtime-wide shared/exclusive mutator lock (level 1).
    MutatorLock = 1,
    /// A thread's suspend counter lock (level 2).
    SuspendLock = 2,
}

impl LockOrder {
    /// Acquisition level of this lock.
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8
    }

    const fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::MutatorLock),
            2 => Some(Self::SuspendLock),
            _ => None,
        }
    }
}

/// Validate that `lock_tag` may be acquired now.
///
/// # Panics
///
/// Panics in debug builds if a lock of a higher level is already held.
#[inline]
#[allow(clippy::missing_const_for_fn)]
pub fn acquire_lock(lock_tag: LockOrder) {
    #[cfg(debug_assertions)]
    {
        if let Some(held) = current_lock_level() {
            validate_lock_order(lock_tag, held);
        }
    }
    let _ = lock_tag;
}

/// RAII record of a held lock, validated on creation.
#[must_use]
pub struct LockGuard {
    _tag: LockOrder,
}

impl LockGuard {
    /// Validate and record `tag` as held until the guard drops.
    #[must_use = "LockGuard must be held for the duration of the critical section"]
    pub fn new(tag: LockOrder) -> Self {
        #[cfg(debug_assertions)]
        {
            acquire_lock(tag);
            let _ = LOCK_ORDER_STATE.try_with(|state| {
                if !state.is_shutdown.get() {
                    state.stack.borrow_mut().push(tag.level());
                }
            });
        }
        Self { _tag: tag }
    }
}

#[cfg(debug_assertions)]
impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = LOCK_ORDER_STATE.try_with(|state| {
            if !state.is_shutdown.get() {
                state.stack.borrow_mut().pop();
            }
        });
    }
}

/// Disable lock order tracking for the current thread.
///
/// Call during thread cleanup, before thread-local storage is destroyed.
#[inline]
#[allow(clippy::missing_const_for_fn)]
pub fn enter_thread_shutdown() {
    #[cfg(debug_assertions)]
    {
        let _ = LOCK_ORDER_STATE.try_with(|state| {
            state.is_shutdown.set(true);
        });
    }
}

/// Panic if `tag` would be acquired below `held`.
#[inline]
#[cfg(debug_assertions)]
pub fn validate_lock_order(tag: LockOrder, held: LockOrder) {
    assert!(
        tag.level() >= held.level(),
        "Lock ordering violation: {tag:?} (level {}) cannot be acquired while holding {held:?} (level {})",
        tag.level(),
        held.level(),
    );
}

/// No-op in release builds.
#[inline]
#[cfg(not(debug_assertions))]
pub const fn validate_lock_order(_tag: LockOrder, _held: LockOrder) {}

/// Highest-level lock the current thread holds, if any.
///
/// Always `None` in release builds and after `enter_thread_shutdown`.
#[must_use]
pub fn current_lock_level() -> Option<LockOrder> {
    LOCK_ORDER_STATE
        .try_with(|state| {
            if state.is_shutdown.get() {
                return None;
            }
            state
                .stack
                .borrow()
                .iter()
                .copied()
                .max()
                .and_then(LockOrder::from_level)
        })
        .ok()
        .flatten()
}
