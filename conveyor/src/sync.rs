//! Blocking primitives the buffer strategies are built from.
//!
//! - `monitor`: a mutex paired with condition variables, with deadline-
//!   and cancellation-aware predicate waits.
//! - [`semaphore`]: a counting semaphore built on the monitor.

pub(crate) mod monitor;
pub mod semaphore;

use thiserror::Error;

/// Why a wait ended without its condition becoming true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The caller's [`CancelToken`](crate::CancelToken) fired.
    #[error("wait cancelled")]
    Cancelled,
    /// The deadline passed first.
    #[error("wait timed out")]
    TimedOut,
}
