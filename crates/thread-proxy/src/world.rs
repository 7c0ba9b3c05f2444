//! Stop-the-world scopes for a collector thread.

use std::marker::PhantomData;

use crate::mutator_lock::MutatorLock;
use crate::proxy::ThreadProxy;
use crate::sync::{acquire_lock, LockOrder};

/// While alive, no listed mutator is `Running`.
///
/// Created with [`StopTheWorld::begin`]: every thread receives an internal
/// suspend request, then the mutator lock is taken exclusively. Running
/// mutators hold the lock shared until they park, so acquisition completes
/// only once all of them have left `Running`. Threads that were already
/// outside managed code (native, blocked, ...) are counted as stopped
/// without waking them; they park on their way back into `Running`.
///
/// Dropping the scope releases the exclusive lock first and then resumes
/// the threads. The scope stays on the thread that began it:
///
/// ```compile_fail
/// use thread_proxy::{new_mutator_lock, StopTheWorld};
///
/// let lock = new_mutator_lock();
/// let world = StopTheWorld::begin(&lock, &[]);
/// std::thread::scope(|s| {
///     s.spawn(move || drop(world));
/// });
/// ```
#[must_use = "the world restarts as soon as the scope is dropped"]
pub struct StopTheWorld<'a, L: MutatorLock> {
    lock: &'a L,
    threads: &'a [&'a ThreadProxy<L>],
    /// The exclusive hold belongs to the thread that called `begin`.
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: MutatorLock> StopTheWorld<'a, L> {
    /// Suspend `threads` and wait until none of them is `Running`.
    ///
    /// Must not be called by one of the listed threads while it is
    /// `Running`, since it would wait for itself.
    pub fn begin(lock: &'a L, threads: &'a [&'a ThreadProxy<L>]) -> Self {
        for thread in threads {
            thread.request_suspend(true);
        }
        acquire_lock(LockOrder::MutatorLock);
        lock.acquire_exclusive();

        #[cfg(feature = "tracing")]
        tracing::debug!(threads = threads.len(), "world stopped");

        Self {
            lock,
            threads,
            _not_send: PhantomData,
        }
    }

    /// The stopped threads.
    #[must_use]
    pub const fn threads(&self) -> &[&'a ThreadProxy<L>] {
        self.threads
    }
}

impl<L: MutatorLock> Drop for StopTheWorld<'_, L> {
    fn drop(&mut self) {
        // SAFETY: `begin` took the exclusive side on this thread, and the
        // scope cannot leave it.
        unsafe { self.lock.release_exclusive() };
        for thread in self.threads {
            thread.request_resume(true);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(threads = self.threads.len(), "world restarted");
    }
}

/// Run `f` with `threads` stopped.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use thread_proxy::{
///     new_mutator_lock, stop_the_world, ExecutionState, NoopHooks, SuspensionConfig,
///     ThreadProxy,
/// };
///
/// let lock = Arc::new(new_mutator_lock());
/// let thread: ThreadProxy =
///     ThreadProxy::new(Arc::clone(&lock), Arc::new(NoopHooks), SuspensionConfig::default());
/// thread.update_status(ExecutionState::Native);
///
/// let running = stop_the_world(&*lock, &[&thread], |stopped| {
///     stopped.iter().filter(|t| t.read_state().is_running()).count()
/// });
/// assert_eq!(running, 0);
/// assert_eq!(thread.suspend_count(), 0);
/// ```
pub fn stop_the_world<L, F, R>(lock: &L, threads: &[&ThreadProxy<L>], f: F) -> R
where
    L: MutatorLock,
    F: FnOnce(&[&ThreadProxy<L>]) -> R,
{
    let scope = StopTheWorld::begin(lock, threads);
    f(scope.threads())
}
