//! Slot and item semaphores around a locked queue.
//!
//! `slots` counts free places and `items` counts published elements. A
//! producer reserves a slot before it touches the queue and publishes an
//! item after; a consumer does the mirror image. Only the reservation step
//! waits, and an abandoned reservation takes no permit, so an aborted call
//! never reaches the queue.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Discipline;
use crate::cancel::CancelToken;
use crate::sync::WaitError;
use crate::sync::semaphore::Semaphore;
use crate::timeout::Deadline;

pub(super) struct SemaphoreQueue<T> {
    slots: Semaphore,
    items: Semaphore,
    queue: Mutex<VecDeque<T>>,
}

impl<T> SemaphoreQueue<T> {
    pub(super) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Semaphore::new(capacity.get()),
            items: Semaphore::new(0),
            queue: Mutex::new(VecDeque::with_capacity(capacity.get())),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes into a reserved slot and publishes the item.
    fn publish(&self, item: T) {
        self.queue().push_back(item);
        self.items.release();
    }

    /// Pops the item a granted `items` permit stands for and frees its slot.
    fn claim(&self) -> T {
        // Every `items` permit is released only after its push, and at most
        // one pop happens per permit, so a granted permit always finds one.
        let Some(item) = self.queue().pop_front() else {
            unreachable!("item permit granted with an empty queue");
        };
        self.slots.release();
        item
    }
}

impl<T: Send + 'static> Discipline<T> for SemaphoreQueue<T> {
    fn put(&self, item: T, deadline: Deadline, cancel: &CancelToken) -> Result<(), (T, WaitError)> {
        if let Err(reason) = self.slots.acquire_until(deadline, cancel) {
            return Err((item, reason));
        }
        self.publish(item);
        Ok(())
    }

    fn take(&self, deadline: Deadline, cancel: &CancelToken) -> Result<T, WaitError> {
        self.items.acquire_until(deadline, cancel)?;
        Ok(self.claim())
    }

    fn try_put(&self, item: T) -> Result<(), T> {
        if !self.slots.try_acquire() {
            return Err(item);
        }
        self.publish(item);
        Ok(())
    }

    fn try_take(&self) -> Option<T> {
        self.items.try_acquire().then(|| self.claim())
    }

    fn len(&self) -> usize {
        self.queue().len()
    }

    fn drain(&self) -> Vec<T> {
        let mut drained = Vec::new();
        while self.items.try_acquire() {
            let Some(item) = self.queue().pop_front() else {
                unreachable!("item permit granted with an empty queue");
            };
            drained.push(item);
        }
        self.slots.release_many(drained.len());
        drained
    }
}
