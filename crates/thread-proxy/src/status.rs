//! The packed per-thread status word.
//!
//! One `AtomicU32` carries both halves of a thread's status:
//!
//! | Bits   | Field            |
//! |--------|------------------|
//! | 0..16  | [`RequestFlags`] |
//! | 16..32 | [`ExecutionState`] |
//!
//! Readers always see both halves as they were at one instant. Flags are
//! written by any thread with `fetch_or`/`fetch_and`; the state half is
//! written only by the owning thread, either with a single `fetch_xor`
//! (no retry needed) or by a compare-and-swap of the whole word when the
//! caller needs the flags to be unchanged at the moment of the store.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{protocol_violation, ProtocolViolation};
use crate::flags::RequestFlags;
use crate::state::ExecutionState;

const FLAGS_MASK: u32 = 0xFFFF;
const STATE_SHIFT: u32 = 16;

/// A decoded snapshot of one load of the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Pending requests.
    pub flags: RequestFlags,
    /// Execution state.
    pub state: ExecutionState,
}

impl Status {
    /// Pack into the word representation.
    #[must_use]
    pub const fn pack(self) -> u32 {
        pack(self.flags, self.state)
    }

    /// Unpack a raw word.
    ///
    /// An unknown state value is a protocol violation.
    #[must_use]
    pub fn unpack(word: u32) -> Self {
        Self {
            flags: flags_of(word),
            state: state_of(word),
        }
    }
}

#[inline]
const fn pack(flags: RequestFlags, state: ExecutionState) -> u32 {
    ((state.raw() as u32) << STATE_SHIFT) | flags.bits() as u32
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn flags_of(word: u32) -> RequestFlags {
    RequestFlags::from_bits_retain((word & FLAGS_MASK) as u16)
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn state_of(word: u32) -> ExecutionState {
    let raw = (word >> STATE_SHIFT) as u16;
    ExecutionState::from_raw(raw)
        .unwrap_or_else(|| protocol_violation(ProtocolViolation::InvalidState(raw)))
}

/// Atomic flags + state word for one thread.
#[derive(Debug)]
pub struct StatusWord {
    word: AtomicU32,
}

impl StatusWord {
    /// Create a word holding `state` and `flags`.
    #[must_use]
    pub const fn new(state: ExecutionState, flags: RequestFlags) -> Self {
        Self {
            word: AtomicU32::new(pack(flags, state)),
        }
    }

    /// Read the flags half. This is the hot poll path.
    #[inline]
    #[must_use]
    pub fn read_flags(&self) -> RequestFlags {
        flags_of(self.word.load(Ordering::Acquire))
    }

    /// Read the state half.
    ///
    /// Does not necessarily agree with a separate [`read_flags`](Self::read_flags);
    /// use [`read_combined`](Self::read_combined) when both are needed.
    #[inline]
    #[must_use]
    pub fn read_state(&self) -> ExecutionState {
        state_of(self.word.load(Ordering::Acquire))
    }

    /// Read both halves from one load.
    #[inline]
    #[must_use]
    pub fn read_combined(&self) -> Status {
        Status::unpack(self.word.load(Ordering::Acquire))
    }

    /// Raise `flag`. Returns the flags before the update.
    pub fn set_flag(&self, flag: RequestFlags) -> RequestFlags {
        flags_of(self.word.fetch_or(u32::from(flag.bits()), Ordering::SeqCst))
    }

    /// Clear `flag`. Returns the flags before the update.
    pub fn clear_flag(&self, flag: RequestFlags) -> RequestFlags {
        flags_of(
            self.word
                .fetch_and(!u32::from(flag.bits()), Ordering::SeqCst),
        )
    }

    /// Replace the state half, leaving the flags alone.
    ///
    /// Only the owning thread writes the state half, so it knows `current`.
    /// XOR-ing the difference into the word installs `new` in a single
    /// atomic step that cannot lose a concurrent flag update.
    pub fn store_state(&self, current: ExecutionState, new: ExecutionState) {
        let delta = u32::from(current.raw() ^ new.raw()) << STATE_SHIFT;
        let prev = self.word.fetch_xor(delta, Ordering::AcqRel);
        let found = state_of(prev);
        if found != current {
            protocol_violation(ProtocolViolation::UnexpectedState {
                expected: current,
                found,
            });
        }
    }

    /// Install `new_state` only if the whole word still equals `current`.
    ///
    /// Fails if any flag changed since `current` was read. On failure the
    /// freshly observed status is returned.
    pub fn compare_exchange(
        &self,
        current: Status,
        new_state: ExecutionState,
    ) -> Result<(), Status> {
        self.word
            .compare_exchange(
                current.pack(),
                pack(current.flags, new_state),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(Status::unpack)
    }
}

#[cfg(test)]
mod tests {
    use super::{Status, StatusWord};
    use crate::flags::RequestFlags;
    use crate::state::ExecutionState;

    #[test]
    fn test_layout() {
        let status = Status {
            flags: RequestFlags::SUSPEND_REQUEST | RequestFlags::SAFEPOINT_REQUEST,
            state: ExecutionState::Native,
        };
        assert_eq!(status.pack(), (10 << 16) | 10);
        assert_eq!(Status::unpack(status.pack()), status);
    }

    #[test]
    fn test_flags_do_not_touch_state() {
        let word = StatusWord::new(ExecutionState::Running, RequestFlags::empty());
        let before = word.set_flag(RequestFlags::SUSPEND_REQUEST);
        assert_eq!(before, RequestFlags::empty());
        word.set_flag(RequestFlags::RUNTIME_TERMINATION_REQUEST);
        assert_eq!(word.read_state(), ExecutionState::Running);
        assert_eq!(
            word.read_flags(),
            RequestFlags::SUSPEND_REQUEST | RequestFlags::RUNTIME_TERMINATION_REQUEST
        );

        word.clear_flag(RequestFlags::SUSPEND_REQUEST);
        assert_eq!(word.read_flags(), RequestFlags::RUNTIME_TERMINATION_REQUEST);
        assert_eq!(word.read_state(), ExecutionState::Running);
    }

    #[test]
    fn test_store_state_keeps_flags() {
        let word = StatusWord::new(ExecutionState::Created, RequestFlags::SAFEPOINT_REQUEST);
        word.store_state(ExecutionState::Created, ExecutionState::Native);
        word.set_flag(RequestFlags::SUSPEND_REQUEST);
        word.store_state(ExecutionState::Native, ExecutionState::Sleeping);

        let status = word.read_combined();
        assert_eq!(status.state, ExecutionState::Sleeping);
        assert_eq!(
            status.flags,
            RequestFlags::SAFEPOINT_REQUEST | RequestFlags::SUSPEND_REQUEST
        );
    }

    #[test]
    #[should_panic(expected = "status store expected Running but found Created")]
    fn test_store_state_from_wrong_state() {
        let word = StatusWord::new(ExecutionState::Created, RequestFlags::empty());
        word.store_state(ExecutionState::Running, ExecutionState::Blocked);
    }

    #[test]
    fn test_compare_exchange_fails_on_flag_change() {
        let word = StatusWord::new(ExecutionState::Blocked, RequestFlags::empty());
        let seen = word.read_combined();
        word.set_flag(RequestFlags::SUSPEND_REQUEST);

        let fresh = word
            .compare_exchange(seen, ExecutionState::Running)
            .unwrap_err();
        assert_eq!(fresh.flags, RequestFlags::SUSPEND_REQUEST);
        assert_eq!(fresh.state, ExecutionState::Blocked);

        word.compare_exchange(fresh, ExecutionState::Running).unwrap();
        assert_eq!(word.read_state(), ExecutionState::Running);
        assert_eq!(word.read_flags(), RequestFlags::SUSPEND_REQUEST);
    }

    #[test]
    fn test_concurrent_flag_updates_survive_state_stores() {
        use std::sync::Arc;
        use std::thread;

        let word = Arc::new(StatusWord::new(ExecutionState::Running, RequestFlags::empty()));

        let setter = {
            let word = Arc::clone(&word);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    word.set_flag(RequestFlags::SAFEPOINT_REQUEST);
                    word.clear_flag(RequestFlags::SAFEPOINT_REQUEST);
                }
                word.set_flag(RequestFlags::SUSPEND_REQUEST);
            })
        };

        let mut state = ExecutionState::Running;
        for i in 0..10_000 {
            let next = if i % 2 == 0 {
                ExecutionState::Native
            } else {
                ExecutionState::Running
            };
            word.store_state(state, next);
            state = next;
        }
        setter.join().unwrap();

        let status = word.read_combined();
        assert_eq!(status.state, state);
        assert_eq!(status.flags, RequestFlags::SUSPEND_REQUEST);
    }
}
