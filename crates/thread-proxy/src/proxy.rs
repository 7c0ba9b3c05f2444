//! Per-thread suspension coordinator.
//!
//! A [`ThreadProxy`] is shared between the mutator thread it describes and
//! any number of controller threads. Controllers raise requests
//! ([`request_suspend`](ThreadProxy::request_suspend),
//! [`request_safepoint`](ThreadProxy::request_safepoint),
//! [`request_runtime_termination`](ThreadProxy::request_runtime_termination));
//! the mutator notices them in [`poll_safepoint`](ThreadProxy::poll_safepoint)
//! or on its way back into `Running`, and services them on its own stack.
//!
//! # Mutator lock
//!
//! A thread in `Running` always holds the mutator lock shared, and a thread
//! in any other state never does. The two directions are ordered
//! differently:
//!
//! - leaving `Running`: publish the new state, then release the lock;
//! - entering `Running`: take the lock, then publish the state with a
//!   compare-and-swap that fails if a request arrived in between.
//!
//! An observer that sees a non-running state therefore knows the lock is
//! free or about to be, and a collector holding the lock exclusively knows
//! nobody can be `Running`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};

use crate::config::SuspensionConfig;
use crate::error::{protocol_violation, ProtocolViolation};
use crate::flags::RequestFlags;
use crate::hooks::RuntimeHooks;
use crate::metrics::{SuspensionMetrics, ThreadMetrics};
use crate::mutator_lock::MutatorLock;
use crate::state::ExecutionState;
use crate::status::{Status, StatusWord};
use crate::sync::{acquire_lock, LockGuard, LockOrder};
use crate::transition::{StepOutcome, StoreRequest, StoreStep};

#[cfg(feature = "tracing")]
use crate::tracing::internal::{
    log_resume_request, log_suspend_request, log_termination, next_suspension_id,
    trace_safepoint, trace_suspension,
};

/// Suspension state of one mutator thread.
pub struct ThreadProxy<L: MutatorLock = parking_lot::RawRwLock> {
    status: StatusWord,
    baseline: RequestFlags,
    /// Outstanding suspend requests, internal and user. This mutex is the
    /// suspend lock.
    suspend_count: Mutex<u32>,
    suspend_var: Condvar,
    /// The user-visible subset of `suspend_count`. Written only under the
    /// suspend lock.
    user_suspend_count: AtomicU32,
    mutator_lock: Arc<L>,
    hooks: Arc<dyn RuntimeHooks>,
    config: SuspensionConfig,
    metrics: ThreadMetrics,
}

impl<L: MutatorLock> std::fmt::Debug for ThreadProxy<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadProxy")
            .field("status", &self.read_combined())
            .field("baseline", &self.baseline)
            .field("user_suspend_count", &self.user_suspend_count())
            .finish_non_exhaustive()
    }
}

impl<L: MutatorLock> ThreadProxy<L> {
    /// Register a new thread in `Created` with the baseline flags.
    #[must_use]
    pub fn new(mutator_lock: Arc<L>, hooks: Arc<dyn RuntimeHooks>, config: SuspensionConfig) -> Self {
        let baseline = config.baseline_flags();
        Self {
            status: StatusWord::new(ExecutionState::Created, baseline),
            baseline,
            suspend_count: Mutex::new(0),
            suspend_var: Condvar::new(),
            user_suspend_count: AtomicU32::new(0),
            mutator_lock,
            hooks,
            config,
            metrics: ThreadMetrics::new(),
        }
    }

    // ------------------------------------------------------------------
    // Queries (any thread)
    // ------------------------------------------------------------------

    /// Pending request flags.
    #[inline]
    #[must_use]
    pub fn read_flags(&self) -> RequestFlags {
        self.status.read_flags()
    }

    /// Current execution state.
    #[inline]
    #[must_use]
    pub fn read_state(&self) -> ExecutionState {
        self.status.read_state()
    }

    /// Flags and state from a single load.
    #[inline]
    #[must_use]
    pub fn read_combined(&self) -> Status {
        self.status.read_combined()
    }

    /// Every state but `Finished`.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.read_state().is_alive()
    }

    /// Whether an explicit user-level suspend is outstanding.
    #[must_use]
    pub fn is_user_suspended(&self) -> bool {
        self.user_suspend_count.load(Ordering::Acquire) > 0
    }

    /// Outstanding user-level suspends, zero or one.
    #[must_use]
    pub fn user_suspend_count(&self) -> u32 {
        self.user_suspend_count.load(Ordering::Acquire)
    }

    /// Outstanding suspend requests. Takes the suspend lock.
    #[must_use]
    pub fn suspend_count(&self) -> u32 {
        let _order = LockGuard::new(LockOrder::SuspendLock);
        *self.suspend_count.lock()
    }

    /// Flags that are always set and never count as a pending request.
    #[must_use]
    pub const fn baseline_flags(&self) -> RequestFlags {
        self.baseline
    }

    /// The configuration this thread was registered with.
    #[must_use]
    pub const fn config(&self) -> &SuspensionConfig {
        &self.config
    }

    /// The mutator lock this thread holds while `Running`.
    #[must_use]
    pub const fn mutator_lock(&self) -> &Arc<L> {
        &self.mutator_lock
    }

    /// Snapshot of this thread's counters.
    #[must_use]
    pub fn metrics(&self) -> SuspensionMetrics {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // Requests (controller or self)
    // ------------------------------------------------------------------

    /// Ask the thread to park at its next safepoint.
    ///
    /// Overlapping requests stack; only the first raises `SUSPEND_REQUEST`.
    /// A user-level (`internal == false`) suspend of an already
    /// user-suspended thread is a no-op.
    pub fn request_suspend(&self, internal: bool) {
        let _order = LockGuard::new(LockOrder::SuspendLock);
        let mut count = self.suspend_count.lock();

        if !internal {
            if self.is_user_suspended() {
                return;
            }
            self.user_suspend_count.fetch_add(1, Ordering::AcqRel);
        }

        *count = count
            .checked_add(1)
            .unwrap_or_else(|| protocol_violation(ProtocolViolation::SuspendCountOverflow));
        if *count == 1 {
            self.status.set_flag(RequestFlags::SUSPEND_REQUEST);
        }

        #[cfg(feature = "tracing")]
        log_suspend_request(internal, *count);
    }

    /// Release one suspend request and wake the thread if it is parked.
    ///
    /// A user-level resume of a thread that is not user-suspended is a
    /// no-op. `SUSPEND_REQUEST` is cleared when the count reaches zero.
    pub fn request_resume(&self, internal: bool) {
        let _order = LockGuard::new(LockOrder::SuspendLock);
        let mut count = self.suspend_count.lock();

        if !internal {
            if !self.is_user_suspended() {
                return;
            }
            let decremented = self.user_suspend_count.fetch_update(
                Ordering::AcqRel,
                Ordering::Acquire,
                |n| n.checked_sub(1),
            );
            if decremented.is_err() {
                protocol_violation(ProtocolViolation::UserSuspendUnderflow);
            }
        }

        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.status.clear_flag(RequestFlags::SUSPEND_REQUEST);
            }
        }

        #[cfg(feature = "tracing")]
        log_resume_request(internal, *count);

        self.suspend_var.notify_all();
    }

    /// Raise `SAFEPOINT_REQUEST`.
    pub fn request_safepoint(&self) {
        self.status.set_flag(RequestFlags::SAFEPOINT_REQUEST);
    }

    /// Clear `SAFEPOINT_REQUEST`.
    pub fn clear_safepoint_request(&self) {
        self.status.clear_flag(RequestFlags::SAFEPOINT_REQUEST);
    }

    /// Raise `RUNTIME_TERMINATION_REQUEST` and wake the thread if parked.
    pub fn request_runtime_termination(&self) {
        self.status
            .set_flag(RequestFlags::RUNTIME_TERMINATION_REQUEST);
        let _order = LockGuard::new(LockOrder::SuspendLock);
        let _count = self.suspend_count.lock();
        self.suspend_var.notify_all();
    }

    // ------------------------------------------------------------------
    // Owning thread only
    // ------------------------------------------------------------------

    /// Service any pending request.
    ///
    /// Called by the interpreter and compiled code at loop back-edges,
    /// method entries and other safepoint-eligible points. Costs one
    /// atomic load and a compare when nothing is pending.
    #[inline]
    pub fn poll_safepoint(&self) {
        let flags = self.status.read_flags();
        if flags.is_pending(self.baseline) {
            self.safepoint_slow(flags);
        }
    }

    #[cold]
    #[inline(never)]
    fn safepoint_slow(&self, flags: RequestFlags) {
        #[cfg(feature = "tracing")]
        let _span = trace_safepoint(flags);

        self.metrics.record_safepoint();
        self.hooks.safepoint(flags);

        let flags = self.status.read_flags();
        if flags.contains(RequestFlags::RUNTIME_TERMINATION_REQUEST) {
            self.terminate();
        }
        if flags.contains(RequestFlags::SUSPEND_REQUEST) {
            self.wait_for_suspension();
        }
    }

    /// Park until every suspend request has been released.
    ///
    /// The thread moves to `Suspended` (releasing the mutator lock if it was
    /// `Running`), waits on the suspend condvar in bounded slices so that a
    /// termination request is never missed, and finally returns to the
    /// state it was in on entry.
    pub fn wait_for_suspension(&self) {
        let prev = self.read_state();

        #[cfg(feature = "tracing")]
        let _span = trace_suspension(prev, next_suspension_id());

        self.hooks.before_suspend();
        self.update_status(ExecutionState::Suspended);

        let parked_at = Instant::now();
        {
            let order = LockGuard::new(LockOrder::SuspendLock);
            let mut count = self.suspend_count.lock();
            while *count > 0 {
                let _ = self
                    .suspend_var
                    .wait_for(&mut count, self.config.suspension_wait_timeout);
                if self
                    .read_flags()
                    .contains(RequestFlags::RUNTIME_TERMINATION_REQUEST)
                {
                    drop(count);
                    drop(order);
                    self.terminate();
                }
            }
        }
        self.metrics.record_suspension(parked_at.elapsed());

        self.update_status(prev);
    }

    fn terminate(&self) -> ! {
        #[cfg(feature = "tracing")]
        log_termination(self.read_state());

        self.update_status(ExecutionState::TerminatedLoop);
        self.hooks.terminate_thread()
    }

    /// Move the thread to `new_state`, keeping the mutator lock in step.
    ///
    /// - `Running` → other: publish the state, then release the lock.
    /// - other → `Running`: service pending requests and take the lock
    ///   before publishing the state.
    /// - `Native` → anything but `TerminatedLoop` while termination is
    ///   requested: go through the flag-checked path so the poll terminates
    ///   the thread instead of letting it touch managed objects.
    /// - anything else: plain store.
    ///
    /// This is the only way to change the state from outside the crate; the
    /// raw store underneath cannot be called on its own:
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    /// use thread_proxy::{new_mutator_lock, ExecutionState, NoopHooks, SuspensionConfig, ThreadProxy};
    ///
    /// let proxy: ThreadProxy =
    ///     ThreadProxy::new(Arc::new(new_mutator_lock()), Arc::new(NoopHooks), SuspensionConfig::default());
    /// proxy.update_status(ExecutionState::Running);
    /// proxy.store_status(ExecutionState::Native, false, false);
    /// ```
    pub fn update_status(&self, new_state: ExecutionState) {
        let current = self.read_state();
        match (current, new_state) {
            (ExecutionState::Running, ExecutionState::Running) => {}
            (ExecutionState::Running, _) => {
                self.store_status(new_state, false, false);
                self.release_mutator_lock();
            }
            (_, ExecutionState::Running) => {
                self.store_status(ExecutionState::Running, true, true);
            }
            (ExecutionState::Native, _)
                if new_state != ExecutionState::TerminatedLoop
                    && self
                        .read_flags()
                        .contains(RequestFlags::RUNTIME_TERMINATION_REQUEST) =>
            {
                self.store_status(new_state, true, false);
            }
            _ => self.store_status(new_state, false, false),
        }
    }

    /// Install `new_state`, optionally servicing pending requests first and
    /// optionally taking the mutator lock shared.
    ///
    /// With neither option this is a single atomic store. Otherwise the
    /// whole word is compare-and-swapped so the flags seen by the check are
    /// the flags at the moment of the store; a failed swap gives back the
    /// lock and starts over.
    pub(crate) fn store_status(&self, new_state: ExecutionState, check_safepoint: bool, with_lock: bool) {
        let request = StoreRequest {
            new_state,
            check_safepoint,
            with_lock,
        };

        let backoff = Backoff::new();
        let mut step = StoreStep::NeedPoll;
        let mut observed = self.status.read_combined();
        let mut lock_held = false;
        let mut failures = 0u32;

        while step != StoreStep::Done {
            let outcome = match step {
                StoreStep::NeedPoll => {
                    observed = self.status.read_combined();
                    if request.check_safepoint && observed.flags.is_pending(self.baseline) {
                        self.poll_safepoint();
                        backoff.snooze();
                        StepOutcome::RequestPending
                    } else {
                        StepOutcome::Clear
                    }
                }
                StoreStep::NeedLock => {
                    self.acquire_mutator_lock();
                    lock_held = true;
                    StepOutcome::LockTaken
                }
                StoreStep::TryCas => {
                    if !request.needs_cas() {
                        self.status.store_state(observed.state, new_state);
                        StepOutcome::Stored
                    } else if self.status.compare_exchange(observed, new_state).is_ok() {
                        StepOutcome::Stored
                    } else {
                        if lock_held {
                            self.release_mutator_lock();
                            lock_held = false;
                        }
                        failures += 1;
                        self.metrics.record_status_retry(failures);
                        if failures >= self.config.max_status_retries {
                            protocol_violation(ProtocolViolation::StatusRetryExhausted {
                                attempts: failures,
                            });
                        }
                        backoff.spin();
                        StepOutcome::CasFailed
                    }
                }
                StoreStep::Done => unreachable!(),
            };
            step = step.next(request, outcome);
        }
    }

    fn acquire_mutator_lock(&self) {
        acquire_lock(LockOrder::MutatorLock);
        self.mutator_lock.acquire_shared();
    }

    fn release_mutator_lock(&self) {
        // SAFETY: called only when leaving `Running` or after a failed CAS
        // that followed `acquire_mutator_lock`, so this thread holds the
        // shared side.
        unsafe { self.mutator_lock.release_shared() };
    }
}
