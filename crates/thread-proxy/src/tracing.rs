//! Suspension tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! spans and events for safepoint polls, suspensions and termination.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    use crate::flags::RequestFlags;
    use crate::state::ExecutionState;

    /// Identifier correlating the events of one suspension.
    ///
    /// Monotonically increasing from 1, shared by every thread.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SuspensionId(pub u64);

    static NEXT_SUSPENSION_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique suspension ID.
    pub fn next_suspension_id() -> SuspensionId {
        SuspensionId(NEXT_SUSPENSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Span covering one slow-path safepoint poll.
    pub fn trace_safepoint(flags: RequestFlags) -> span::EnteredSpan {
        span!(Level::DEBUG, "safepoint", flags = flags.bits()).entered()
    }

    /// Span covering one park in `wait_for_suspension`.
    pub fn trace_suspension(prev: ExecutionState, id: SuspensionId) -> span::EnteredSpan {
        span!(
            Level::DEBUG,
            "suspension",
            prev_state = %prev,
            suspension_id = id.0
        )
        .entered()
    }

    /// A suspend request raised the counter.
    pub fn log_suspend_request(internal: bool, suspend_count: u32) {
        tracing::debug!(internal, suspend_count, "suspend_request");
    }

    /// A resume request lowered the counter.
    pub fn log_resume_request(internal: bool, suspend_count: u32) {
        tracing::debug!(internal, suspend_count, "resume_request");
    }

    /// The thread is leaving through the termination hook.
    pub fn log_termination(state: ExecutionState) {
        tracing::info!(state = %state, "runtime termination");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SuspensionId(pub u64);

    /// Stub function when tracing is disabled.
    #[allow(dead_code)]
    pub const fn next_suspension_id() -> SuspensionId {
        SuspensionId(0)
    }
}

pub use internal::SuspensionId;
