//! Callbacks into the rest of the runtime.

use crate::flags::RequestFlags;

/// Runtime services the suspension protocol calls out to.
///
/// None of these are invoked with the suspend lock held.
pub trait RuntimeHooks: Send + Sync {
    /// Coordinated work for a non-baseline poll, e.g. a collection.
    ///
    /// Runs on the polling thread before the proxy services suspend and
    /// termination requests itself.
    fn safepoint(&self, flags: RequestFlags) {
        let _ = flags;
    }

    /// Runs on the target thread right before it parks, e.g. to dump its
    /// stack when requested.
    fn before_suspend(&self) {}

    /// Leave the thread for good after a runtime termination request.
    ///
    /// The proxy has already moved the thread to `TerminatedLoop`. The
    /// default parks the thread forever so it never touches managed
    /// objects again.
    fn terminate_thread(&self) -> ! {
        loop {
            std::thread::park();
        }
    }
}

/// Hooks that do nothing beyond the defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl RuntimeHooks for NoopHooks {}
