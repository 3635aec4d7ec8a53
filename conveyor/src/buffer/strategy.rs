//! Selection of the primitive behind a buffer.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Discipline;
use super::fair::FairQueue;
use super::monitor::MonitorQueue;
use super::semaphore::SemaphoreQueue;

/// How a [`BoundedBuffer`](super::BoundedBuffer) parks and wakes callers.
///
/// | Strategy    | Primitive                              | Same-kind wake order |
/// |-------------|----------------------------------------|----------------------|
/// | `Monitor`   | one mutex, "not full"/"not empty" condvars | unspecified     |
/// | `Semaphore` | slot and item semaphores around a locked queue | unspecified |
/// | `Fair`      | monitor plus per-side ticket queues    | arrival order        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Monitor,
    Semaphore,
    Fair,
}

impl Strategy {
    pub const ALL: [Self; 3] = [Self::Monitor, Self::Semaphore, Self::Fair];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Semaphore => "semaphore",
            Self::Fair => "fair",
        }
    }

    pub(super) fn build<T: Send + 'static>(self, capacity: NonZeroUsize) -> Arc<dyn Discipline<T>> {
        match self {
            Self::Monitor => Arc::new(MonitorQueue::new(capacity)),
            Self::Semaphore => Arc::new(SemaphoreQueue::new(capacity)),
            Self::Fair => Arc::new(FairQueue::new(capacity)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised strategy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy {0:?} (expected monitor, semaphore or fair)")]
pub struct ParseStrategyError(String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStrategyError(s.to_owned()))
    }
}
