//! Mutex + condition variables with predicate waits.
//!
//! Every wait re-checks its predicate after each wake-up, so spurious wakes
//! and wakes stolen by another thread are harmless. The mutex is released
//! while parked and reacquired before the predicate is evaluated again.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::WaitError;
use crate::cancel::{CancelToken, Wake};
use crate::timeout::Deadline;
use crate::trace::trace;

/// Shared state guarded by one mutex, with `K` independent wake-up signals.
///
/// Signals are addressed by index, so a bounded buffer can keep "not full"
/// and "not empty" waiters apart while sharing one lock.
pub(crate) struct Monitor<S, const K: usize> {
    state: Mutex<S>,
    signals: [Condvar; K],
}

impl<S, const K: usize> Monitor<S, K> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            signals: std::array::from_fn(|_| Condvar::new()),
        }
    }

    /// Locks the state.
    ///
    /// State is never left half-updated across a panic point, so a poisoned
    /// lock still guards consistent data and is recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_one(&self, signal: usize) {
        self.signals[signal].notify_one();
    }

    pub(crate) fn notify_all(&self, signal: usize) {
        self.signals[signal].notify_all();
    }
}

impl<S: Send + 'static, const K: usize> Monitor<S, K> {
    /// Parks on `signal` while `blocked` holds.
    ///
    /// Returns the guard in every case so the caller can finish its update,
    /// or undo a reservation, under the same critical section. The outcome is
    /// `Err` when the deadline passes or `cancel` fires before `blocked`
    /// turns false.
    ///
    /// A waiter that gives up while its condition is in fact satisfied passes
    /// the wake-up on to another waiter on the same signal, since it may have
    /// consumed a `notify_one` meant for somebody who will act on it.
    pub(crate) fn wait_while<'a, F>(
        this: &'a Arc<Self>,
        mut guard: MutexGuard<'a, S>,
        signal: usize,
        deadline: Deadline,
        cancel: &CancelToken,
        mut blocked: F,
    ) -> (MutexGuard<'a, S>, Result<(), WaitError>)
    where
        F: FnMut(&mut S) -> bool,
    {
        if !blocked(&mut guard) {
            return (guard, Ok(()));
        }

        // Registered under the state lock: a cancel that fires from here on
        // has to take this lock to notify, which it cannot do until we park.
        let _registration = cancel.register(Arc::clone(this) as Arc<dyn Wake>);
        trace!(signal, "parking");

        loop {
            if cancel.is_cancelled() {
                return this.abort(guard, signal, WaitError::Cancelled, &mut blocked);
            }

            guard = match deadline.remaining() {
                None => this.signals[signal]
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(left) if left.is_zero() => {
                    return this.abort(guard, signal, WaitError::TimedOut, &mut blocked);
                }
                Some(left) => {
                    this.signals[signal]
                        .wait_timeout(guard, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };

            if !blocked(&mut guard) {
                trace!(signal, "woken with condition satisfied");
                return (guard, Ok(()));
            }
        }
    }

    fn abort<'a, F>(
        &self,
        mut guard: MutexGuard<'a, S>,
        signal: usize,
        reason: WaitError,
        blocked: &mut F,
    ) -> (MutexGuard<'a, S>, Result<(), WaitError>)
    where
        F: FnMut(&mut S) -> bool,
    {
        if !blocked(&mut guard) {
            self.notify_one(signal);
        }
        (guard, Err(reason))
    }
}

impl<S: Send, const K: usize> Wake for Monitor<S, K> {
    fn wake(&self) {
        // Holding the lock orders this notify after any waiter's cancel
        // check, so the waiter is either parked or about to re-check.
        let _guard = self.lock();
        for signal in &self.signals {
            signal.notify_all();
        }
    }
}
