//! Bounded blocking FIFO buffer.
//!
//! A [`BoundedBuffer`] is a fixed-capacity queue shared by any number of
//! producer and consumer threads:
//!
//! - [`put`](BoundedBuffer::put) blocks while the buffer is full.
//! - [`take`](BoundedBuffer::take) blocks while the buffer is empty.
//! - `*_timeout` variants give up after a bounded wait.
//! - `try_*` variants never block.
//!
//! Every blocking call takes a [`CancelToken`]. A call that is cancelled or
//! times out leaves the buffer exactly as it found it: a rejected item is
//! handed back to the caller, and nothing is removed.
//!
//! # Strategies
//!
//! The synchronization primitive underneath is chosen with [`Strategy`].
//! All strategies honour the same contract; they differ in how waiters are
//! parked and in whether waiters of the same kind are served in arrival
//! order ([`Strategy::Fair`]) or in no particular order.
//!
//! # Example
//!
//! ```
//! use conveyor::{BoundedBuffer, CancelToken};
//! use std::thread;
//!
//! let buffer = BoundedBuffer::new(2).unwrap();
//! let token = CancelToken::new();
//!
//! buffer.put(1, &token).unwrap();
//! buffer.put(2, &token).unwrap();
//!
//! // Full: this producer parks until the consumer below makes room.
//! let producer = {
//!     let buffer = buffer.clone();
//!     let token = token.clone();
//!     thread::spawn(move || buffer.put(3, &token))
//! };
//!
//! assert_eq!(buffer.take(&token).unwrap(), 1);
//! producer.join().unwrap().unwrap();
//! assert_eq!(buffer.take(&token).unwrap(), 2);
//! assert_eq!(buffer.take(&token).unwrap(), 3);
//! ```

mod fair;
mod monitor;
mod semaphore;
mod strategy;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::BufferConfig;
use crate::sync::WaitError;
use crate::timeout::{Deadline, Timeout};
use crate::trace::{debug, info};

pub use strategy::{ParseStrategyError, Strategy};

/// Requested capacity was zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer capacity must be greater than 0")]
pub struct CapacityError;

/// A blocking call was cancelled before it could complete.
///
/// For [`put`](BoundedBuffer::put) this carries the item that was not
/// inserted; for [`take`](BoundedBuffer::take) it carries nothing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cancelled<T = ()>(pub T);

impl<T> Cancelled<T> {
    /// Recovers the payload.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Cancelled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cancelled(..)")
    }
}

impl<T> fmt::Display for Cancelled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled while waiting")
    }
}

impl<T> std::error::Error for Cancelled<T> {}

/// A bounded insert did not happen. The item is returned in both cases.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PutTimeoutError<T> {
    /// No space became available within the wait.
    Timeout(T),
    /// The caller's token fired first.
    Cancelled(T),
}

impl<T> PutTimeoutError<T> {
    /// Recovers the item that was not inserted.
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(item) | Self::Cancelled(item) => item,
        }
    }

    /// Whether no space appeared within the wait.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the caller's token fired.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl<T> fmt::Debug for PutTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("Timeout(..)"),
            Self::Cancelled(_) => f.write_str("Cancelled(..)"),
        }
    }
}

impl<T> fmt::Display for PutTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("timed out waiting for space"),
            Self::Cancelled(_) => f.write_str("cancelled while waiting for space"),
        }
    }
}

impl<T> std::error::Error for PutTimeoutError<T> {}

/// The primitive a [`BoundedBuffer`] delegates to.
///
/// Implementations own all locking. The capacity bound, FIFO order and
/// the "aborted calls leave no trace" rule are theirs to uphold; the
/// buffer only handles entry checks and logging.
trait Discipline<T>: Send + Sync {
    fn put(&self, item: T, deadline: Deadline, cancel: &CancelToken) -> Result<(), (T, WaitError)>;
    fn take(&self, deadline: Deadline, cancel: &CancelToken) -> Result<T, WaitError>;
    fn try_put(&self, item: T) -> Result<(), T>;
    fn try_take(&self) -> Option<T>;
    fn len(&self) -> usize;
    fn drain(&self) -> Vec<T>;
}

/// Fixed-capacity FIFO queue with blocking, bounded and cancellable
/// insertion and removal.
///
/// Cloning yields another handle to the same buffer. Buffers created by
/// separate constructor calls share nothing.
pub struct BoundedBuffer<T> {
    inner: Arc<dyn Discipline<T>>,
    capacity: NonZeroUsize,
    strategy: Strategy,
}

impl<T: Send + 'static> BoundedBuffer<T> {
    /// Creates a buffer holding at most `capacity` items, using the default
    /// [`Strategy::Monitor`].
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        Self::with_strategy(capacity, Strategy::default())
    }

    /// Creates a buffer backed by the given strategy.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if `capacity` is zero.
    pub fn with_strategy(capacity: usize, strategy: Strategy) -> Result<Self, CapacityError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CapacityError)?;
        info!(capacity = capacity.get(), %strategy, "creating bounded buffer");
        Ok(Self {
            inner: strategy.build(capacity),
            capacity,
            strategy,
        })
    }

    /// Creates a buffer from a [`BufferConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if the configured capacity is zero.
    pub fn from_config(config: &BufferConfig) -> Result<Self, CapacityError> {
        Self::with_strategy(config.capacity, config.strategy)
    }

    /// Appends `item`, waiting as long as it takes for space.
    ///
    /// # Errors
    ///
    /// Returns the item inside [`Cancelled`] if `cancel` fires first, or was
    /// already cancelled on entry. The buffer is unchanged in that case.
    pub fn put(&self, item: T, cancel: &CancelToken) -> Result<(), Cancelled<T>> {
        self.put_within(item, Timeout::Infinite, cancel)
            .map_err(|(item, _)| Cancelled(item))
    }

    /// Removes the head item, waiting as long as it takes for one to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires first, or was already
    /// cancelled on entry. Nothing is removed in that case.
    pub fn take(&self, cancel: &CancelToken) -> Result<T, Cancelled> {
        match self.take_within(Timeout::Infinite, cancel) {
            Ok(item) => Ok(item),
            Err(_) => Err(Cancelled(())),
        }
    }

    /// Appends `item`, waiting at most `timeout` for space.
    ///
    /// # Errors
    ///
    /// [`PutTimeoutError::Timeout`] if no space appeared in time,
    /// [`PutTimeoutError::Cancelled`] if `cancel` fired. The item is handed
    /// back and the buffer is unchanged in both cases.
    pub fn put_timeout(
        &self,
        item: T,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<(), PutTimeoutError<T>> {
        self.put_within(item, Timeout::Duration(timeout), cancel)
            .map_err(|(item, reason)| match reason {
                WaitError::TimedOut => PutTimeoutError::Timeout(item),
                WaitError::Cancelled => PutTimeoutError::Cancelled(item),
            })
    }

    /// Removes the head item, waiting at most `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` if the buffer stayed empty for the whole wait.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires first.
    pub fn take_timeout(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<T>, Cancelled> {
        match self.take_within(Timeout::Duration(timeout), cancel) {
            Ok(item) => Ok(Some(item)),
            Err(WaitError::TimedOut) => Ok(None),
            Err(WaitError::Cancelled) => Err(Cancelled(())),
        }
    }

    /// Appends `item` only if there is space right now.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the buffer is full (or, under
    /// [`Strategy::Fair`], if other producers are already waiting).
    pub fn try_put(&self, item: T) -> Result<(), T> {
        self.inner.try_put(item)
    }

    /// Removes the head item only if one is available right now.
    #[must_use]
    pub fn try_take(&self) -> Option<T> {
        self.inner.try_take()
    }

    /// Removes every buffered item in FIFO order and wakes blocked producers.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        let drained = self.inner.drain();
        debug!(count = drained.len(), "drained buffer");
        drained
    }

    /// Number of buffered items, read under the buffer's lock.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    /// Whether no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the buffer holds `capacity` items.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity.get()
    }

    /// Maximum number of buffered items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Primitive this buffer was built with.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    // `reason` only feeds the log line.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn put_within(
        &self,
        item: T,
        timeout: Timeout,
        cancel: &CancelToken,
    ) -> Result<(), (T, WaitError)> {
        if cancel.is_cancelled() {
            return Err((item, WaitError::Cancelled));
        }
        self.inner
            .put(item, timeout.deadline(), cancel)
            .inspect_err(|(_, reason)| {
                debug!(%reason, "put abandoned");
            })
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn take_within(&self, timeout: Timeout, cancel: &CancelToken) -> Result<T, WaitError> {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        self.inner
            .take(timeout.deadline(), cancel)
            .inspect_err(|reason| {
                debug!(%reason, "take abandoned");
            })
    }
}

impl<T> Clone for BoundedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
            strategy: self.strategy,
        }
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity)
            .field("size", &self.inner.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}
