//! Logical time for tracking changes.

use std::fmt;

/// Logical clock reading - a monotonically increasing counter for tracking changes.
///
/// The clock of a [`GraphRuntime`](crate::GraphRuntime) advances by exactly one
/// tick each time a source value is first set or set to a different value.
/// Reads and no-op writes never advance it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogicalTime(u64);

impl LogicalTime {
    /// The reading of a fresh clock, before any input was set.
    pub const ZERO: Self = Self(0);

    /// Get the numeric value of this reading.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Advance by one tick and return the new reading.
    #[inline]
    pub(crate) fn tick(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
