//! Cooperative cancellation for blocked calls.
//!
//! A [`CancelToken`] is the signal a caller hands to every blocking buffer
//! operation. Cancelling it makes each wait registered against it return
//! promptly with a cancellation result.
//!
//! # Waking
//!
//! A waiting primitive registers a [`Wake`] handle with the token for the
//! duration of its wait. `cancel()` first publishes the flag, then snapshots
//! the registry and wakes each handle *after* releasing the registry lock.
//! Handles take their own state lock inside `wake`, so the only lock order
//! is "primitive state, then registry" (during registration) and never the
//! reverse.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::trace::debug;

/// Something that can be poked awake when a token is cancelled.
///
/// Implementations must acquire the same lock their waiters hold while
/// checking [`CancelToken::is_cancelled`] before notifying, otherwise a
/// cancellation landing between the check and the wait would be lost.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

type Registry = HashMap<u64, Arc<dyn Wake>>;

struct Inner {
    cancelled: AtomicBool,
    next_key: AtomicU64,
    wakers: Mutex<Registry>,
    children: Mutex<Vec<Weak<Inner>>>,
    // Keeps the chain up to the root alive while any descendant is.
    _parent: Option<Arc<Inner>>,
}

impl Inner {
    fn new(parent: Option<Arc<Inner>>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            next_key: AtomicU64::new(0),
            wakers: Mutex::new(HashMap::new()),
            children: Mutex::new(Vec::new()),
            _parent: parent,
        }
    }

    fn children(&self) -> MutexGuard<'_, Vec<Weak<Inner>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wakers(&self) -> MutexGuard<'_, Registry> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let wakers: Vec<Arc<dyn Wake>> = self.wakers().values().cloned().collect();
        debug!(waiters = wakers.len(), "cancel token fired");
        for waker in wakers {
            waker.wake();
        }

        let children = std::mem::take(&mut *self.children());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Shared cancellation signal for blocking calls.
///
/// Clones observe and fire the same signal. Cancellation is one-way: once
/// cancelled a token stays cancelled, and every later blocking call made
/// with it returns the cancellation result without touching the buffer.
///
/// # Example
///
/// ```
/// use conveyor::{BoundedBuffer, CancelToken};
///
/// let buffer = BoundedBuffer::<u32>::new(1).unwrap();
/// let token = CancelToken::new();
///
/// let waiter = {
///     let buffer = buffer.clone();
///     let token = token.clone();
///     std::thread::spawn(move || buffer.take(&token))
/// };
///
/// token.cancel();
/// assert!(waiter.join().unwrap().is_err());
/// assert_eq!(buffer.size(), 0);
/// ```
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(None)),
        }
    }

    /// Fires the signal. Idempotent.
    ///
    /// Every wait currently registered against this token (or any child) is
    /// woken and returns a cancellation result.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called on this token or an
    /// ancestor.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Derives a token that fires when `self` fires.
    ///
    /// Cancelling the child does not affect the parent, so one worker can be
    /// stopped without stopping its siblings.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self {
            inner: Arc::new(Inner::new(Some(Arc::clone(&self.inner)))),
        };
        {
            let mut children = self.inner.children();
            if !self.is_cancelled() {
                children.retain(|c| {
                    c.upgrade()
                        .is_some_and(|c| !c.cancelled.load(Ordering::Acquire))
                });
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        // Parent already fired: the child is born cancelled.
        child.cancel();
        child
    }

    /// Registers `waker` until the returned guard is dropped.
    pub(crate) fn register(&self, waker: Arc<dyn Wake>) -> Registration<'_> {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers().insert(key, waker);
        Registration { token: self, key }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Keeps a waker registered with a token. Unregisters on drop.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    key: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token.inner.wakers().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_is_sticky_and_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_wakes_registered_waiters_once() {
        let token = CancelToken::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let _registration = token.register(Arc::clone(&counter) as Arc<dyn Wake>);
        token.cancel();
        token.cancel();

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_registration_is_not_woken() {
        let token = CancelToken::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        drop(token.register(Arc::clone(&counter) as Arc<dyn Wake>));
        token.cancel();

        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(token.inner.wakers().is_empty());
    }

    #[test]
    fn child_follows_parent_but_not_the_reverse() {
        let parent = CancelToken::new();
        let first = parent.child();
        let second = parent.child();

        first.cancel();
        assert!(first.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!second.is_cancelled());

        parent.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn dropped_children_are_not_retained() {
        let parent = CancelToken::new();
        for _ in 0..10_000 {
            drop(parent.child());
        }
        let live = parent.child();

        assert!(parent.inner.children().len() <= 2);
        parent.cancel();
        assert!(live.is_cancelled());
    }

    #[test]
    fn cancelling_parent_wakes_waiters_on_grandchildren() {
        let parent = CancelToken::new();
        let grandchild = parent.child().child();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let _registration = grandchild.register(Arc::clone(&counter) as Arc<dyn Wake>);
        parent.cancel();

        assert!(grandchild.is_cancelled());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
