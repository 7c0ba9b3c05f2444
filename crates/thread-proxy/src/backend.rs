//! Suspension backends.
//!
//! Runtime code talks to a thread's suspension machinery through
//! [`SuspensionBackend`]. Two implementations exist, chosen when the
//! thread is registered:
//!
//! - [`ThreadProxy`]: the status word, suspend counter and mutator lock
//!   are managed directly by this crate.
//! - [`HybridBackend`]: every operation is forwarded to an externally owned
//!   [`ThreadHolder`]. This crate does not know or enforce the holder's own
//!   coordination rules.

use std::sync::Arc;

use crate::mutator_lock::MutatorLock;
use crate::proxy::ThreadProxy;
use crate::state::ExecutionState;

/// The suspension protocol as seen by the rest of the runtime.
pub trait SuspensionBackend: Send + Sync {
    /// See [`ThreadProxy::request_suspend`].
    fn request_suspend(&self, internal: bool);
    /// See [`ThreadProxy::request_resume`].
    fn request_resume(&self, internal: bool);
    /// See [`ThreadProxy::is_user_suspended`].
    fn is_user_suspended(&self) -> bool;
    /// See [`ThreadProxy::poll_safepoint`].
    fn poll_safepoint(&self);
    /// See [`ThreadProxy::wait_for_suspension`].
    fn wait_for_suspension(&self);
    /// See [`ThreadProxy::update_status`].
    fn update_status(&self, new_state: ExecutionState);
    /// See [`ThreadProxy::read_state`].
    fn read_state(&self) -> ExecutionState;

    /// Every state but `Finished`.
    fn is_alive(&self) -> bool {
        self.read_state().is_alive()
    }
}

impl<L: MutatorLock> SuspensionBackend for ThreadProxy<L> {
    fn request_suspend(&self, internal: bool) {
        Self::request_suspend(self, internal);
    }

    fn request_resume(&self, internal: bool) {
        Self::request_resume(self, internal);
    }

    fn is_user_suspended(&self) -> bool {
        Self::is_user_suspended(self)
    }

    #[inline]
    fn poll_safepoint(&self) {
        Self::poll_safepoint(self);
    }

    fn wait_for_suspension(&self) {
        Self::wait_for_suspension(self);
    }

    fn update_status(&self, new_state: ExecutionState) {
        Self::update_status(self, new_state);
    }

    fn read_state(&self) -> ExecutionState {
        Self::read_state(self)
    }
}

/// An externally owned thread object that implements suspension itself.
pub trait ThreadHolder: Send + Sync {
    /// Add a suspend request.
    fn suspend(&self, internal: bool);
    /// Release a suspend request.
    fn resume(&self, internal: bool);
    /// Whether a user-level suspend is outstanding.
    fn is_user_suspended(&self) -> bool;
    /// Service pending requests.
    fn safepoint_poll(&self);
    /// Park until released.
    fn wait_suspension(&self);
    /// Change the execution state.
    fn set_state(&self, state: ExecutionState);
    /// Current execution state.
    fn state(&self) -> ExecutionState;
}

/// Backend that forwards to a [`ThreadHolder`].
#[derive(Debug)]
pub struct HybridBackend<H: ThreadHolder> {
    holder: Arc<H>,
}

impl<H: ThreadHolder> HybridBackend<H> {
    /// Wrap `holder`.
    #[must_use]
    pub const fn new(holder: Arc<H>) -> Self {
        Self { holder }
    }

    /// The wrapped holder.
    #[must_use]
    pub const fn holder(&self) -> &Arc<H> {
        &self.holder
    }
}

impl<H: ThreadHolder> SuspensionBackend for HybridBackend<H> {
    fn request_suspend(&self, internal: bool) {
        self.holder.suspend(internal);
    }

    fn request_resume(&self, internal: bool) {
        self.holder.resume(internal);
    }

    fn is_user_suspended(&self) -> bool {
        self.holder.is_user_suspended()
    }

    fn poll_safepoint(&self) {
        self.holder.safepoint_poll();
    }

    fn wait_for_suspension(&self) {
        self.holder.wait_suspension();
    }

    fn update_status(&self, new_state: ExecutionState) {
        self.holder.set_state(new_state);
    }

    fn read_state(&self) -> ExecutionState {
        self.holder.state()
    }
}
