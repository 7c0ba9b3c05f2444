//! Execution state of a mutator thread.

use std::fmt;

/// What a mutator thread is currently doing.
///
/// Exactly one value holds per thread at any instant. The numeric
/// representation is only used to pack the state into the status word;
/// states are compared by identity, never by order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ExecutionState {
    /// Registered with the runtime but not yet started.
    #[default]
    Created = 0,
    /// Executing managed code. The thread holds the mutator lock shared.
    Running = 1,
    /// Blocked on a monitor.
    Blocked = 2,
    /// Waiting on a monitor without a timeout.
    Waiting = 3,
    /// Waiting on a monitor with a timeout.
    TimedWaiting = 4,
    /// Parked on a suspend request.
    Suspended = 5,
    /// Waiting for the compiler.
    CompilerWaiting = 6,
    /// Waiting for a lock to be inflated.
    WaitingInflation = 7,
    /// Sleeping.
    Sleeping = 8,
    /// Parked forever after a runtime termination request.
    TerminatedLoop = 9,
    /// Executing native code outside the managed heap.
    Native = 10,
    /// Tearing down.
    Terminating = 11,
    /// Deregistered. Terminal.
    Finished = 12,
}

impl ExecutionState {
    /// All states, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Created,
        Self::Running,
        Self::Blocked,
        Self::Waiting,
        Self::TimedWaiting,
        Self::Suspended,
        Self::CompilerWaiting,
        Self::WaitingInflation,
        Self::Sleeping,
        Self::TerminatedLoop,
        Self::Native,
        Self::Terminating,
        Self::Finished,
    ];

    /// Decode a raw packed value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Blocked,
            3 => Self::Waiting,
            4 => Self::TimedWaiting,
            5 => Self::Suspended,
            6 => Self::CompilerWaiting,
            7 => Self::WaitingInflation,
            8 => Self::Sleeping,
            9 => Self::TerminatedLoop,
            10 => Self::Native,
            11 => Self::Terminating,
            12 => Self::Finished,
            _ => return None,
        })
    }

    /// The packed representation.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Only `Running` holds the mutator lock.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Every state but `Finished`.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Finished)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionState;

    #[test]
    fn test_raw_decode_matches_every_state() {
        for state in ExecutionState::ALL {
            assert_eq!(ExecutionState::from_raw(state.raw()), Some(state));
        }
        assert_eq!(ExecutionState::from_raw(13), None);
        assert_eq!(ExecutionState::from_raw(u16::MAX), None);
    }

    #[test]
    fn test_only_finished_is_dead() {
        let dead: Vec<_> = ExecutionState::ALL
            .into_iter()
            .filter(|s| !s.is_alive())
            .collect();
        assert_eq!(dead, vec![ExecutionState::Finished]);
    }

    #[test]
    fn test_default_is_created() {
        assert_eq!(ExecutionState::default(), ExecutionState::Created);
        assert!(!ExecutionState::Created.is_running());
        assert!(ExecutionState::Running.is_running());
    }
}
