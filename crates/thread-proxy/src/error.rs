//! Fatal protocol violations.
//!
//! Nothing in this crate returns a recoverable error. A violation means the
//! status word or the suspend counters can no longer be trusted by other
//! threads, so the only safe reaction is to stop. Release builds are built
//! with `panic = "abort"`; debug builds unwind so tests can observe the
//! failure.

use std::fmt;

use crate::state::ExecutionState;

/// An invariant of the suspension protocol was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// `request_resume(false)` found a user suspend but the user count was zero.
    UserSuspendUnderflow,
    /// More outstanding suspend requests than the counter can hold.
    SuspendCountOverflow,
    /// The state half of the status word held an unknown value.
    InvalidState(u16),
    /// A plain store expected one state and found another.
    UnexpectedState {
        /// State the owning thread believed it was in.
        expected: ExecutionState,
        /// State actually found in the word.
        found: ExecutionState,
    },
    /// `store_status` gave up after too many failed compare-and-swaps.
    StatusRetryExhausted {
        /// Consecutive failed attempts.
        attempts: u32,
    },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserSuspendUnderflow => {
                write!(f, "user suspend count underflow")
            }
            Self::SuspendCountOverflow => {
                write!(f, "suspend count overflow")
            }
            Self::InvalidState(raw) => {
                write!(f, "invalid execution state {raw:#x} in status word")
            }
            Self::UnexpectedState { expected, found } => {
                write!(f, "status store expected {expected} but found {found}")
            }
            Self::StatusRetryExhausted { attempts } => {
                write!(f, "status store made no progress after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for ProtocolViolation {}

/// Report a protocol violation and stop.
#[cold]
#[inline(never)]
#[track_caller]
pub fn protocol_violation(violation: ProtocolViolation) -> ! {
    #[cfg(feature = "tracing")]
    tracing::error!(%violation, "suspension protocol violation");

    panic!("suspension protocol violation: {violation}");
}
