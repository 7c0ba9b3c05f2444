//! The `store_status` retry loop as an explicit state machine.
//!
//! ```text
//!             pending ┌──────────┐
//!           ┌────────▶│ NeedPoll │◀───────────────┐
//!           └─────────┤          │                │ cas failed
//!                     └────┬─────┘                │ (lock released)
//!              clear,      │      clear,          │
//!              with_lock   │      no lock         │
//!                 ┌────────┴───────┐              │
//!                 ▼                ▼              │
//!           ┌──────────┐ taken ┌────────┐─────────┘
//!           │ NeedLock │──────▶│ TryCas │
//!           └──────────┘       └───┬────┘
//!                                  │ stored
//!                                  ▼
//!                              ┌──────┐
//!                              │ Done │
//!                              └──────┘
//! ```
//!
//! The transition function is pure; the side effects of each step live in
//! `ThreadProxy::store_status`.

use crate::state::ExecutionState;

/// Parameters of one `store_status` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRequest {
    /// State to install.
    pub new_state: ExecutionState,
    /// Service pending requests before installing the state.
    pub check_safepoint: bool,
    /// Take the mutator lock shared before installing the state.
    pub with_lock: bool,
}

impl StoreRequest {
    /// A store with neither a flag check nor a lock.
    #[must_use]
    pub const fn plain(new_state: ExecutionState) -> Self {
        Self {
            new_state,
            check_safepoint: false,
            with_lock: false,
        }
    }

    /// Whether the store must compare-and-swap the whole word.
    ///
    /// A flag check is only meaningful if the flags seen by the check are
    /// still the flags at the moment of the store, and a lock taken for the
    /// store must be given back if a request slipped in meanwhile.
    #[must_use]
    pub const fn needs_cas(&self) -> bool {
        self.check_safepoint || self.with_lock
    }
}

/// Where the `store_status` loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStep {
    /// Read the word and service pending requests if asked to.
    NeedPoll,
    /// Acquire the mutator lock shared.
    NeedLock,
    /// Install the new state.
    TryCas,
    /// The new state is installed.
    Done,
}

/// What happened while executing a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A request was pending and has been polled.
    RequestPending,
    /// No request needed servicing.
    Clear,
    /// The mutator lock is now held shared.
    LockTaken,
    /// The new state was installed.
    Stored,
    /// The word changed under us; any lock taken has been released.
    CasFailed,
}

impl StoreStep {
    /// The step following `self` given `outcome`.
    ///
    /// # Panics
    ///
    /// Panics if `outcome` cannot be produced by `self`.
    #[must_use]
    pub fn next(self, request: StoreRequest, outcome: StepOutcome) -> Self {
        match (self, outcome) {
            (Self::NeedPoll, StepOutcome::RequestPending) => Self::NeedPoll,
            (Self::NeedPoll, StepOutcome::Clear) => {
                if request.with_lock {
                    Self::NeedLock
                } else {
                    Self::TryCas
                }
            }
            (Self::NeedLock, StepOutcome::LockTaken) => Self::TryCas,
            (Self::TryCas, StepOutcome::Stored) => Self::Done,
            (Self::TryCas, StepOutcome::CasFailed) => Self::NeedPoll,
            (step, outcome) => unreachable!("{outcome:?} cannot follow {step:?}"),
        }
    }
}
