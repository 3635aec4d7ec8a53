//! Single mutex with "not full" and "not empty" condition variables.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::Discipline;
use crate::cancel::CancelToken;
use crate::sync::WaitError;
use crate::sync::monitor::Monitor;
use crate::timeout::Deadline;

const NOT_FULL: usize = 0;
const NOT_EMPTY: usize = 1;

/// Non-fair buffer: whichever parked thread the OS wakes first wins.
pub(super) struct MonitorQueue<T> {
    monitor: Arc<Monitor<VecDeque<T>, 2>>,
    capacity: usize,
}

impl<T> MonitorQueue<T> {
    pub(super) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            monitor: Arc::new(Monitor::new(VecDeque::with_capacity(capacity.get()))),
            capacity: capacity.get(),
        }
    }
}

impl<T: Send + 'static> Discipline<T> for MonitorQueue<T> {
    fn put(&self, item: T, deadline: Deadline, cancel: &CancelToken) -> Result<(), (T, WaitError)> {
        let capacity = self.capacity;
        let guard = self.monitor.lock();
        let (mut queue, outcome) =
            Monitor::wait_while(&self.monitor, guard, NOT_FULL, deadline, cancel, |queue| {
                queue.len() >= capacity
            });
        if let Err(reason) = outcome {
            return Err((item, reason));
        }

        queue.push_back(item);
        drop(queue);
        self.monitor.notify_one(NOT_EMPTY);
        Ok(())
    }

    fn take(&self, deadline: Deadline, cancel: &CancelToken) -> Result<T, WaitError> {
        let guard = self.monitor.lock();
        let (mut queue, outcome) =
            Monitor::wait_while(&self.monitor, guard, NOT_EMPTY, deadline, cancel, |queue| {
                queue.is_empty()
            });
        outcome?;

        let Some(item) = queue.pop_front() else {
            unreachable!("woken with a non-empty queue");
        };
        drop(queue);
        self.monitor.notify_one(NOT_FULL);
        Ok(item)
    }

    fn try_put(&self, item: T) -> Result<(), T> {
        let mut queue = self.monitor.lock();
        if queue.len() >= self.capacity {
            return Err(item);
        }
        queue.push_back(item);
        drop(queue);
        self.monitor.notify_one(NOT_EMPTY);
        Ok(())
    }

    fn try_take(&self) -> Option<T> {
        let item = self.monitor.lock().pop_front()?;
        self.monitor.notify_one(NOT_FULL);
        Some(item)
    }

    fn len(&self) -> usize {
        self.monitor.lock().len()
    }

    fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.monitor.lock().drain(..).collect();
        if !drained.is_empty() {
            self.monitor.notify_all(NOT_FULL);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeout::Timeout;
    use std::thread;
    use std::time::Duration;

    fn queue(capacity: usize) -> Arc<MonitorQueue<u32>> {
        Arc::new(MonitorQueue::new(NonZeroUsize::new(capacity).unwrap()))
    }

    #[test]
    fn timed_out_take_forwards_stolen_wakeup() {
        // Two consumers park; a single put wakes exactly one of them. Whether
        // or not the woken one is also timing out, the item must be taken.
        let queue = queue(1);
        let token = CancelToken::new();

        let consumers: Vec<_> = (0..2)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let token = token.clone();
                thread::spawn(move || {
                    let timeout = if i == 0 { 30 } else { 300 };
                    queue.take(
                        Timeout::Duration(Duration::from_millis(timeout)).deadline(),
                        &token,
                    )
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(30));
        queue.put(7, Deadline::NEVER, &token).unwrap();

        let results: Vec<_> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r == &&Ok(7)).count(), 1);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let queue = queue(3);
        let token = CancelToken::new();

        let producers: Vec<_> = (0..6)
            .map(|p| {
                let queue = Arc::clone(&queue);
                let token = token.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.put(p * 1000 + i, Deadline::NEVER, &token).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = 0;
        while seen < 600 {
            assert!(queue.len() <= 3);
            if queue.take(Deadline::NEVER, &token).is_ok() {
                seen += 1;
            }
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(queue.len(), 0);
    }
}
