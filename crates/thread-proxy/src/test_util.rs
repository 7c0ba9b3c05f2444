//! Instrumented collaborators for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use parking_lot::lock_api::RawRwLock as _;
use parking_lot::Mutex;

use crate::flags::RequestFlags;
use crate::hooks::RuntimeHooks;
use crate::mutator_lock::{new_mutator_lock, MutatorLock};

/// A real `parking_lot` mutator lock that also records its holders.
pub struct InstrumentedLock {
    raw: parking_lot::RawRwLock,
    shared_holders: Mutex<HashSet<ThreadId>>,
    exclusive_holder: Mutex<Option<ThreadId>>,
    shared_acquisitions: AtomicUsize,
}

impl Default for InstrumentedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentedLock {
    /// An unlocked instrumented lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: new_mutator_lock(),
            shared_holders: Mutex::new(HashSet::new()),
            exclusive_holder: Mutex::new(None),
            shared_acquisitions: AtomicUsize::new(0),
        }
    }

    /// Whether `thread` currently holds the shared side.
    #[must_use]
    pub fn is_held_shared_by(&self, thread: ThreadId) -> bool {
        self.shared_holders.lock().contains(&thread)
    }

    /// Whether the calling thread currently holds the shared side.
    #[must_use]
    pub fn is_held_shared_by_current(&self) -> bool {
        self.is_held_shared_by(std::thread::current().id())
    }

    /// Number of threads holding the shared side.
    #[must_use]
    pub fn shared_holder_count(&self) -> usize {
        self.shared_holders.lock().len()
    }

    /// Whether any thread holds the exclusive side.
    #[must_use]
    pub fn is_held_exclusive(&self) -> bool {
        self.exclusive_holder.lock().is_some()
    }

    /// Total successful shared acquisitions.
    #[must_use]
    pub fn shared_acquisitions(&self) -> usize {
        self.shared_acquisitions.load(Ordering::Relaxed)
    }
}

impl MutatorLock for InstrumentedLock {
    fn acquire_shared(&self) {
        let me = std::thread::current().id();
        assert!(
            !self.is_held_shared_by(me),
            "mutator lock acquired shared twice by {me:?}"
        );
        self.raw.lock_shared();
        self.shared_holders.lock().insert(me);
        self.shared_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn release_shared(&self) {
        let me = std::thread::current().id();
        assert!(
            self.shared_holders.lock().remove(&me),
            "mutator lock released by non-holder {me:?}"
        );
        // SAFETY: `me` was recorded as a shared holder.
        unsafe { self.raw.unlock_shared() };
    }

    fn acquire_exclusive(&self) {
        self.raw.lock_exclusive();
        *self.exclusive_holder.lock() = Some(std::thread::current().id());
    }

    unsafe fn release_exclusive(&self) {
        *self.exclusive_holder.lock() = None;
        // SAFETY: the caller holds the exclusive side.
        unsafe { self.raw.unlock_exclusive() };
    }
}

/// Panic payload used by [`RecordingHooks::terminate_thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated;

/// Hooks that count their invocations.
///
/// `terminate_thread` unwinds with a [`Terminated`] payload so a test can
/// observe the exit through `JoinHandle::join`.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    safepoints: AtomicUsize,
    before_suspend: AtomicUsize,
    terminations: AtomicUsize,
    last_flags: Mutex<RequestFlags>,
}

impl RecordingHooks {
    /// Fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `safepoint`.
    #[must_use]
    pub fn safepoints(&self) -> usize {
        self.safepoints.load(Ordering::SeqCst)
    }

    /// Calls to `before_suspend`.
    #[must_use]
    pub fn before_suspend_calls(&self) -> usize {
        self.before_suspend.load(Ordering::SeqCst)
    }

    /// Calls to `terminate_thread`.
    #[must_use]
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    /// Flags passed to the most recent `safepoint` call.
    #[must_use]
    pub fn last_flags(&self) -> RequestFlags {
        *self.last_flags.lock()
    }
}

impl RuntimeHooks for RecordingHooks {
    fn safepoint(&self, flags: RequestFlags) {
        *self.last_flags.lock() = flags;
        self.safepoints.fetch_add(1, Ordering::SeqCst);
    }

    fn before_suspend(&self) {
        self.before_suspend.fetch_add(1, Ordering::SeqCst);
    }

    fn terminate_thread(&self) -> ! {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        std::panic::panic_any(Terminated)
    }
}

/// Whether a joined thread's panic payload is [`Terminated`].
#[must_use]
pub fn is_terminated(payload: &(dyn std::any::Any + Send)) -> bool {
    payload.downcast_ref::<Terminated>().is_some()
}

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed.
pub fn wait_until(timeout: std::time::Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while !condition() {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    true
}
