//! Asynchronous requests a controller can raise against a mutator.

bitflags::bitflags! {
    /// Pending request bitmask, stored in the low half of the status word.
    ///
    /// Flags are independent of each other and of the execution state.
    /// Several may be set at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequestFlags: u16 {
        /// The thread should park in `wait_for_suspension`.
        const SUSPEND_REQUEST = 2;
        /// The runtime is tearing down; the thread must not return to managed code.
        const RUNTIME_TERMINATION_REQUEST = 4;
        /// A safepoint operation (e.g. a collection) is pending.
        const SAFEPOINT_REQUEST = 8;

        // Unknown bits round-trip through the status word untouched.
        const _ = !0;
    }
}

impl RequestFlags {
    /// Whether these flags differ from `baseline`, i.e. a request is pending.
    #[inline]
    #[must_use]
    pub const fn is_pending(self, baseline: Self) -> bool {
        self.bits() != baseline.bits()
    }
}
