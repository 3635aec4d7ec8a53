//! Bounded blocking FIFO buffer for producer/consumer threads.
//!
//! - [`BoundedBuffer`] - fixed-capacity queue with blocking, timed and
//!   non-blocking insert/remove
//! - [`CancelToken`] - cooperative cancellation accepted by every blocking call
//! - [`Strategy`] - the primitive underneath (condvar monitor, semaphore pair,
//!   or a fair monitor that serves waiters in arrival order)
//! - [`BufferConfig`] - capacity and strategy, from serde or the environment

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod sync;
pub mod timeout;
mod trace;

#[doc(inline)]
pub use buffer::{BoundedBuffer, Cancelled, CapacityError, PutTimeoutError, Strategy};
#[doc(inline)]
pub use cancel::CancelToken;
#[doc(inline)]
pub use config::{BufferConfig, ConfigError};
#[doc(inline)]
pub use sync::WaitError;
#[doc(inline)]
pub use timeout::Timeout;
pub use trace::init_tracing;
