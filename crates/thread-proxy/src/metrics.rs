//! Per-thread suspension metrics.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of one thread's suspension statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuspensionMetrics {
    /// Polls that found a pending request and took the slow path.
    pub safepoints_taken: u64,
    /// Completed parks in `wait_for_suspension`.
    pub suspensions: u64,
    /// Total time spent parked.
    pub suspended_time: Duration,
    /// Failed compare-and-swaps in `store_status`.
    pub status_retries: u64,
    /// Longest run of consecutive failed compare-and-swaps in one store.
    pub max_retry_streak: u32,
}

/// Live counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct ThreadMetrics {
    safepoints_taken: AtomicU64,
    suspensions: AtomicU64,
    suspended_nanos: AtomicU64,
    status_retries: AtomicU64,
    max_retry_streak: AtomicU32,
}

impl ThreadMetrics {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            safepoints_taken: AtomicU64::new(0),
            suspensions: AtomicU64::new(0),
            suspended_nanos: AtomicU64::new(0),
            status_retries: AtomicU64::new(0),
            max_retry_streak: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_safepoint(&self) {
        self.safepoints_taken.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self, parked: Duration) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(parked.as_nanos()).unwrap_or(u64::MAX);
        self.suspended_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_status_retry(&self, streak: u32) {
        self.status_retries.fetch_add(1, Ordering::Relaxed);
        self.max_retry_streak.fetch_max(streak, Ordering::Relaxed);
    }

    /// Take a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SuspensionMetrics {
        SuspensionMetrics {
            safepoints_taken: self.safepoints_taken.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
            suspended_time: Duration::from_nanos(self.suspended_nanos.load(Ordering::Relaxed)),
            status_retries: self.status_retries.load(Ordering::Relaxed),
            max_retry_streak: self.max_retry_streak.load(Ordering::Relaxed),
        }
    }
}
