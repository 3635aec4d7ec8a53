//! Cancellation of blocked callers, for every strategy.

use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

use conveyor::{BoundedBuffer, CancelToken, Strategy};

static INIT_TRACING: Once = Once::new();

fn buffer<T: Send + 'static>(capacity: usize, strategy: Strategy) -> BoundedBuffer<T> {
    INIT_TRACING.call_once(conveyor::init_tracing);
    BoundedBuffer::with_strategy(capacity, strategy).expect("non-zero capacity")
}

fn settle() {
    thread::sleep(Duration::from_millis(50));
}

#[test]
fn cancelled_put_leaves_no_trace() {
    for strategy in Strategy::ALL {
        let buffer = buffer::<&'static str>(1, strategy);
        let shared = CancelToken::new();
        buffer.put("kept", &shared).unwrap();

        let token = CancelToken::new();
        let producer = {
            let buffer = buffer.clone();
            let token = token.clone();
            thread::spawn(move || buffer.put("dropped", &token))
        };

        settle();
        token.cancel();
        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.into_inner(), "dropped", "{strategy}");

        assert_eq!(buffer.take(&shared).unwrap(), "kept");
        assert_eq!(
            buffer
                .take_timeout(Duration::from_millis(30), &shared)
                .unwrap(),
            None,
            "{strategy}: cancelled item was inserted"
        );
    }
}

#[test]
fn cancelled_take_removes_nothing() {
    for strategy in Strategy::ALL {
        let buffer = buffer::<u32>(2, strategy);
        let token = CancelToken::new();

        let consumer = {
            let buffer = buffer.clone();
            let token = token.clone();
            thread::spawn(move || buffer.take(&token))
        };

        settle();
        token.cancel();
        assert!(consumer.join().unwrap().is_err(), "{strategy}");

        let fresh = CancelToken::new();
        buffer.put(7, &fresh).unwrap();
        assert_eq!(buffer.size(), 1);
        assert_eq!(buffer.take(&fresh).unwrap(), 7);
    }
}

#[test]
fn cancel_wakes_promptly() {
    for strategy in Strategy::ALL {
        let buffer = buffer::<u8>(1, strategy);
        let token = CancelToken::new();

        let consumer = {
            let buffer = buffer.clone();
            let token = token.clone();
            thread::spawn(move || {
                let result = buffer.take(&token);
                (result.is_err(), Instant::now())
            })
        };

        settle();
        let cancelled_at = Instant::now();
        token.cancel();
        let (cancelled, woke_at) = consumer.join().unwrap();

        assert!(cancelled, "{strategy}");
        assert!(
            woke_at.duration_since(cancelled_at) < Duration::from_millis(500),
            "{strategy}: cancellation took too long"
        );
    }
}

#[test]
fn cancel_interrupts_timed_waits() {
    for strategy in Strategy::ALL {
        let full = buffer::<u8>(1, strategy);
        let empty = buffer::<u8>(1, strategy);
        full.put(0, &CancelToken::new()).unwrap();
        let token = CancelToken::new();

        let producer = {
            let full = full.clone();
            let token = token.clone();
            thread::spawn(move || full.put_timeout(1, Duration::from_secs(30), &token))
        };
        let consumer = {
            let empty = empty.clone();
            let token = token.clone();
            thread::spawn(move || empty.take_timeout(Duration::from_secs(30), &token))
        };

        settle();
        let started = Instant::now();
        token.cancel();

        let err = producer.join().unwrap().unwrap_err();
        assert!(err.is_cancelled(), "{strategy}");
        assert_eq!(err.into_inner(), 1);
        assert!(consumer.join().unwrap().is_err(), "{strategy}");
        assert!(started.elapsed() < Duration::from_secs(5), "{strategy}");

        assert_eq!(full.drain(), vec![0]);
        assert!(empty.is_empty());
    }
}

#[test]
fn cancelling_one_waiter_does_not_disturb_others() {
    for strategy in Strategy::ALL {
        let buffer = buffer::<u32>(1, strategy);
        let doomed = CancelToken::new();
        let survivor = CancelToken::new();

        let cancelled = {
            let buffer = buffer.clone();
            let token = doomed.clone();
            thread::spawn(move || buffer.take(&token))
        };
        let waiting = {
            let buffer = buffer.clone();
            let token = survivor.clone();
            thread::spawn(move || buffer.take(&token))
        };

        settle();
        doomed.cancel();
        assert!(cancelled.join().unwrap().is_err(), "{strategy}");

        buffer.put(42, &survivor).unwrap();
        assert_eq!(waiting.join().unwrap().unwrap(), 42, "{strategy}");
    }
}

#[test]
fn parent_cancel_reaches_child_token_waiters() {
    for strategy in Strategy::ALL {
        let buffer = buffer::<u8>(1, strategy);
        let parent = CancelToken::new();
        let child = parent.child();

        let consumer = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.take(&child))
        };

        settle();
        parent.cancel();
        assert!(consumer.join().unwrap().is_err(), "{strategy}");
    }
}

#[test]
fn cancel_then_reuse_buffer_under_load() {
    const ROUNDS: u32 = 20;

    for strategy in Strategy::ALL {
        let buffer = buffer::<u32>(2, strategy);

        for round in 0..ROUNDS {
            let token = CancelToken::new();
            let blocked: Vec<_> = (0..3)
                .map(|_| {
                    let buffer = buffer.clone();
                    let token = token.clone();
                    thread::spawn(move || buffer.take(&token))
                })
                .collect();

            thread::sleep(Duration::from_millis(5));
            token.cancel();
            for handle in blocked {
                // A late starter sees the token already cancelled.
                assert!(handle.join().unwrap().is_err(), "{strategy} round {round}");
            }

            let live = CancelToken::new();
            buffer.put(round, &live).unwrap();
            assert_eq!(buffer.take(&live).unwrap(), round);
        }
    }
}
