//! Producer/consumer workload over a bounded buffer.
//!
//! Usage:
//!     cargo run --release --bin conveyor-demo
//!
//! Environment variables:
//!     CONVEYOR_CAPACITY=16        Buffer capacity (default: 16)
//!     CONVEYOR_STRATEGY=monitor   monitor | semaphore | fair (default: monitor)
//!     PRODUCERS=4                 Producer threads (default: 4)
//!     CONSUMERS=4                 Consumer threads (default: 4)
//!     ITEMS=10000                 Items per producer (default: 10000)
//!
//! Every producer tags its values, consumers record what they take, and the
//! run fails if any value is lost or delivered twice.

use std::env;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use conveyor::{BoundedBuffer, BufferConfig, CancelToken};

type Payload = u64;

/// Values are `producer << TAG_SHIFT | sequence`.
const TAG_SHIFT: u32 = 32;

fn env_count(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn produce(buffer: &BoundedBuffer<Payload>, token: &CancelToken, producer: usize, items: usize) {
    for sequence in 0..items {
        let value = ((producer as Payload) << TAG_SHIFT) | sequence as Payload;
        if buffer.put(value, token).is_err() {
            return;
        }
    }
}

fn consume(buffer: &BoundedBuffer<Payload>, token: &CancelToken) -> Vec<Payload> {
    let mut taken = Vec::new();
    // Keep going until cancelled *and* drained, so nothing published is left behind.
    loop {
        match buffer.take_timeout(Duration::from_millis(10), token) {
            Ok(Some(value)) => taken.push(value),
            Ok(None) => {}
            Err(_) => {
                taken.extend(std::iter::from_fn(|| buffer.try_take()));
                return taken;
            }
        }
    }
}

/// Checks every produced value arrived exactly once.
fn verify(mut received: Vec<Payload>, producers: usize, items: usize) -> Result<(), String> {
    if received.len() != producers * items {
        return Err(format!(
            "expected {} values, received {}",
            producers * items,
            received.len()
        ));
    }
    received.sort_unstable();
    received.dedup();
    if received.len() != producers * items {
        return Err("duplicate values received".into());
    }
    Ok(())
}

fn main() -> ExitCode {
    conveyor::init_tracing();

    let config = match BufferConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let producers = env_count("PRODUCERS", 4);
    let consumers = env_count("CONSUMERS", 4);
    let items = env_count("ITEMS", 10_000);

    let buffer = match BoundedBuffer::<Payload>::from_config(&config) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "conveyor demo (strategy={}, capacity={}, producers={producers}, consumers={consumers}, items={items}):",
        config.strategy, config.capacity
    );

    let producer_token = CancelToken::new();
    let consumer_token = CancelToken::new();
    let start = Instant::now();

    let received = thread::scope(|scope| {
        let consumer_handles: Vec<_> = (0..consumers)
            .map(|i| {
                let buffer = buffer.clone();
                let token = consumer_token.clone();
                thread::Builder::new()
                    .name(format!("consumer-{i}"))
                    .spawn_scoped(scope, move || consume(&buffer, &token))
                    .expect("failed to spawn consumer thread")
            })
            .collect();

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let buffer = buffer.clone();
                let token = producer_token.clone();
                thread::Builder::new()
                    .name(format!("producer-{p}"))
                    .spawn_scoped(scope, move || produce(&buffer, &token, p, items))
                    .expect("failed to spawn producer thread")
            })
            .collect();

        for handle in producer_handles {
            handle.join().expect("producer panicked");
        }
        consumer_token.cancel();

        consumer_handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("consumer panicked"))
            .collect::<Vec<_>>()
    });

    let elapsed = start.elapsed();
    let total = received.len() as u128;
    println!(
        "{} items in {:?} ({} ops/ms)",
        total,
        elapsed,
        total * 1_000_000 / elapsed.as_nanos().max(1)
    );

    match verify(received, producers, items) {
        Ok(()) => {
            println!("no loss, no duplication");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("verification failed: {e}");
            ExitCode::FAILURE
        }
    }
}
