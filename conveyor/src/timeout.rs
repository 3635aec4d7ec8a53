//! Wait bounds for blocking operations.

use std::time::Duration;

use minstant::Instant;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

impl Timeout {
    /// Fixes the wait bound to an absolute instant, measured from now.
    ///
    /// A duration too large to represent is treated as infinite.
    #[must_use]
    pub fn deadline(self) -> Deadline {
        match self {
            Self::Infinite => Deadline(None),
            Self::Duration(d) => Deadline(Instant::now().checked_add(d)),
        }
    }
}

/// Absolute end of a wait, fixed once when the call starts.
///
/// Spurious and stolen wake-ups re-enter the wait with whatever time is left,
/// so a bounded call never waits longer than its original budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub const NEVER: Self = Self(None);

    /// Time left before expiry, `None` for an unbounded wait.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.checked_duration_since(Instant::now()).unwrap_or(Duration::ZERO))
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}
