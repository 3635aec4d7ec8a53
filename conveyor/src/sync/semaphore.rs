//! Counting semaphore with timed and cancellable acquisition.

use std::fmt;
use std::sync::Arc;

use super::WaitError;
use super::monitor::Monitor;
use crate::cancel::CancelToken;
use crate::timeout::{Deadline, Timeout};

const AVAILABLE: usize = 0;

/// A counting semaphore.
///
/// Clones share the same permit count. Acquisition order among blocked
/// callers is unspecified.
///
/// # Example
///
/// ```
/// use conveyor::{CancelToken, Timeout};
/// use conveyor::sync::semaphore::Semaphore;
///
/// let permits = Semaphore::new(1);
/// let token = CancelToken::new();
///
/// permits.acquire(Timeout::Infinite, &token).unwrap();
/// assert!(!permits.try_acquire());
/// permits.release();
/// assert_eq!(permits.available(), 1);
/// ```
#[derive(Clone)]
pub struct Semaphore {
    permits: Arc<Monitor<usize, 1>>,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Arc::new(Monitor::new(permits)),
        }
    }

    /// Takes one permit, waiting up to `timeout` for one to be released.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Cancelled`] if `cancel` fires first (including
    /// when it was already cancelled on entry) and [`WaitError::TimedOut`]
    /// if the timeout elapses. No permit is taken in either case.
    pub fn acquire(&self, timeout: Timeout, cancel: &CancelToken) -> Result<(), WaitError> {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        self.acquire_until(timeout.deadline(), cancel)
    }

    pub(crate) fn acquire_until(
        &self,
        deadline: Deadline,
        cancel: &CancelToken,
    ) -> Result<(), WaitError> {
        let guard = self.permits.lock();
        let (mut permits, outcome) = Monitor::wait_while(
            &self.permits,
            guard,
            AVAILABLE,
            deadline,
            cancel,
            |permits| *permits == 0,
        );
        outcome?;
        *permits -= 1;
        Ok(())
    }

    /// Takes one permit if one is available right now.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Returns one permit and wakes a waiter, if any.
    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.permits.notify_one(AVAILABLE);
    }

    /// Returns `n` permits at once and wakes every waiter.
    pub fn release_many(&self, n: usize) {
        if n == 0 {
            return;
        }
        *self.permits.lock() += n;
        self.permits.notify_all(AVAILABLE);
    }

    /// Permits available at the instant of the call.
    #[must_use]
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("available", &self.available())
            .finish()
    }
}
