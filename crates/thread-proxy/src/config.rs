//! Process-wide suspension settings.

use std::time::Duration;

use crate::flags::RequestFlags;

/// Default bound on a single condvar wait in `wait_for_suspension`.
pub const DEFAULT_SUSPENSION_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default bound on consecutive failed compare-and-swaps in `store_status`.
pub const DEFAULT_MAX_STATUS_RETRIES: u32 = 1 << 20;

/// Settings fixed at startup and passed by value into every thread proxy.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use thread_proxy::{RequestFlags, SuspensionConfig};
///
/// let config = SuspensionConfig::new()
///     .with_run_gc_every_safepoint(true)
///     .with_suspension_wait_timeout(Duration::from_millis(20));
///
/// assert_eq!(config.baseline_flags(), RequestFlags::SAFEPOINT_REQUEST);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionConfig {
    /// Start every thread with `SAFEPOINT_REQUEST` already raised.
    pub run_gc_every_safepoint: bool,
    /// How long a suspended thread waits before re-checking for termination.
    pub suspension_wait_timeout: Duration,
    /// Consecutive CAS failures tolerated before `store_status` gives up.
    pub max_status_retries: u32,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspensionConfig {
    /// Default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            run_gc_every_safepoint: false,
            suspension_wait_timeout: DEFAULT_SUSPENSION_WAIT_TIMEOUT,
            max_status_retries: DEFAULT_MAX_STATUS_RETRIES,
        }
    }

    /// Set [`run_gc_every_safepoint`](Self::run_gc_every_safepoint).
    #[must_use]
    pub const fn with_run_gc_every_safepoint(mut self, enabled: bool) -> Self {
        self.run_gc_every_safepoint = enabled;
        self
    }

    /// Set [`suspension_wait_timeout`](Self::suspension_wait_timeout).
    #[must_use]
    pub const fn with_suspension_wait_timeout(mut self, timeout: Duration) -> Self {
        self.suspension_wait_timeout = timeout;
        self
    }

    /// Set [`max_status_retries`](Self::max_status_retries).
    #[must_use]
    pub const fn with_max_status_retries(mut self, retries: u32) -> Self {
        self.max_status_retries = retries;
        self
    }

    /// The flags every thread starts with and polls compare against.
    #[must_use]
    pub const fn baseline_flags(&self) -> RequestFlags {
        if self.run_gc_every_safepoint {
            RequestFlags::SAFEPOINT_REQUEST
        } else {
            RequestFlags::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SuspensionConfig::default();
        assert!(!config.run_gc_every_safepoint);
        assert_eq!(config.suspension_wait_timeout, Duration::from_millis(100));
        assert_eq!(config.max_status_retries, DEFAULT_MAX_STATUS_RETRIES);
        assert_eq!(config.baseline_flags(), RequestFlags::empty());
    }

    #[test]
    fn test_builder() {
        let config = SuspensionConfig::new()
            .with_run_gc_every_safepoint(true)
            .with_max_status_retries(3);
        assert_eq!(config.baseline_flags(), RequestFlags::SAFEPOINT_REQUEST);
        assert_eq!(config.max_status_retries, 3);
    }
}
