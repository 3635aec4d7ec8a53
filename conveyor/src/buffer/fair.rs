//! Monitor with strict arrival-order service among same-kind waiters.
//!
//! Each blocking caller draws a ticket and joins its side's line. It may
//! proceed only once its ticket is at the front *and* the buffer allows the
//! operation, so a late arrival can never overtake a parked caller. Because
//! the OS may wake any parked thread, progress is announced with
//! `notify_all` and every waiter re-checks whether it is the one at the
//! front.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, MutexGuard};

use super::Discipline;
use crate::cancel::CancelToken;
use crate::sync::WaitError;
use crate::sync::monitor::Monitor;
use crate::timeout::Deadline;

const NOT_FULL: usize = 0;
const NOT_EMPTY: usize = 1;

type Ticket = u64;

struct State<T> {
    queue: VecDeque<T>,
    capacity: usize,
    producers: VecDeque<Ticket>,
    consumers: VecDeque<Ticket>,
    next_ticket: Ticket,
}

impl<T> State<T> {
    fn draw(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        ticket
    }

    fn has_space(&self) -> bool {
        self.queue.len() < self.capacity
    }
}

/// Removes `ticket` from `line`, wherever it stands.
fn leave(line: &mut VecDeque<Ticket>, ticket: Ticket) {
    if let Some(index) = line.iter().position(|&t| t == ticket) {
        line.remove(index);
    }
}

pub(super) struct FairQueue<T> {
    monitor: Arc<Monitor<State<T>, 2>>,
}

impl<T> FairQueue<T> {
    pub(super) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            monitor: Arc::new(Monitor::new(State {
                queue: VecDeque::with_capacity(capacity.get()),
                capacity: capacity.get(),
                producers: VecDeque::new(),
                consumers: VecDeque::new(),
                next_ticket: 0,
            })),
        }
    }

    /// Wakes whichever sides may now make progress.
    fn announce(&self, state: MutexGuard<'_, State<T>>) {
        let wake_producers = !state.producers.is_empty() && state.has_space();
        let wake_consumers = !state.consumers.is_empty() && !state.queue.is_empty();
        drop(state);
        if wake_producers {
            self.monitor.notify_all(NOT_FULL);
        }
        if wake_consumers {
            self.monitor.notify_all(NOT_EMPTY);
        }
    }
}

impl<T: Send + 'static> Discipline<T> for FairQueue<T> {
    fn put(&self, item: T, deadline: Deadline, cancel: &CancelToken) -> Result<(), (T, WaitError)> {
        let mut state = self.monitor.lock();
        let ticket = state.draw();
        state.producers.push_back(ticket);

        let (mut state, outcome) =
            Monitor::wait_while(&self.monitor, state, NOT_FULL, deadline, cancel, |s| {
                s.producers.front() != Some(&ticket) || !s.has_space()
            });

        leave(&mut state.producers, ticket);
        if let Err(reason) = outcome {
            self.announce(state);
            return Err((item, reason));
        }

        state.queue.push_back(item);
        self.announce(state);
        Ok(())
    }

    fn take(&self, deadline: Deadline, cancel: &CancelToken) -> Result<T, WaitError> {
        let mut state = self.monitor.lock();
        let ticket = state.draw();
        state.consumers.push_back(ticket);

        let (mut state, outcome) =
            Monitor::wait_while(&self.monitor, state, NOT_EMPTY, deadline, cancel, |s| {
                s.consumers.front() != Some(&ticket) || s.queue.is_empty()
            });

        leave(&mut state.consumers, ticket);
        if let Err(reason) = outcome {
            self.announce(state);
            return Err(reason);
        }

        let Some(item) = state.queue.pop_front() else {
            unreachable!("front consumer admitted with an empty queue");
        };
        self.announce(state);
        Ok(item)
    }

    fn try_put(&self, item: T) -> Result<(), T> {
        let mut state = self.monitor.lock();
        if !state.producers.is_empty() || !state.has_space() {
            return Err(item);
        }
        state.queue.push_back(item);
        self.announce(state);
        Ok(())
    }

    fn try_take(&self) -> Option<T> {
        let mut state = self.monitor.lock();
        if !state.consumers.is_empty() {
            return None;
        }
        let item = state.queue.pop_front()?;
        self.announce(state);
        Some(item)
    }

    fn len(&self) -> usize {
        self.monitor.lock().queue.len()
    }

    fn drain(&self) -> Vec<T> {
        let mut state = self.monitor.lock();
        let drained = state.queue.drain(..).collect();
        self.announce(state);
        drained
    }
}
