//! Blocking channel throughput and latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin channel_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2  Pin consumer to CPU 2 (default: 2)
//!     CAPACITY=1024   Channel capacity (default: 1024)

use std::env;
use std::sync::Arc;
use std::thread;

use quartz::{Channel, ChannelError, Timer, TimerConfig, TimerError};

const ITERATIONS: u32 = 1 << 20;
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
enum BenchError {
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),
    #[error("timer: {0}")]
    Timer(#[from] TimerError),
    #[error("worker thread panicked")]
    Panicked,
    #[error("data corruption: expected {expected}, got {got}")]
    Corruption { expected: u32, got: u32 },
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    (
        Some(env_or("PRODUCER_CPU", 0)),
        Some(env_or("CONSUMER_CPU", 2)),
    )
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn decode(bytes: &[u8]) -> u32 {
    bytes
        .try_into()
        .map(u32::from_le_bytes)
        .unwrap_or(u32::MAX)
}

fn bench_throughput(
    capacity: usize,
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
) -> Result<(), BenchError> {
    let channel = Arc::new(Channel::with_capacity(capacity)?);
    let rx = Arc::clone(&channel);

    let consumer = thread::spawn(move || -> Result<(), BenchError> {
        pin_to_cpu(consumer_cpu);
        for expected in 0..ITERATIONS {
            let got = decode(rx.receive()?.bytes());
            if got != expected {
                return Err(BenchError::Corruption { expected, got });
            }
        }
        Ok(())
    });

    pin_to_cpu(producer_cpu);
    let mut timer = Timer::new(TimerConfig::default())?;
    timer.tick();

    for i in 0..ITERATIONS {
        channel.send(i.to_le_bytes())?;
    }
    consumer.join().map_err(|_| BenchError::Panicked)??;

    let elapsed_ns = u128::from(timer.tick().max(1));
    let ops_per_ms = u128::from(ITERATIONS) * 1_000_000 / elapsed_ns;
    println!("{ops_per_ms} ops/ms");
    Ok(())
}

fn bench_rtt(
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
) -> Result<(), BenchError> {
    let ping = Arc::new(Channel::with_capacity(1)?);
    let pong = Arc::new(Channel::with_capacity(1)?);

    let responder = {
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        thread::spawn(move || -> Result<(), BenchError> {
            pin_to_cpu(consumer_cpu);
            for _ in 0..ITERATIONS {
                pong.send_message(ping.receive()?)?;
            }
            Ok(())
        })
    };

    pin_to_cpu(producer_cpu);
    let mut timer = Timer::new(TimerConfig::default())?;
    timer.tick();

    for i in 0..ITERATIONS {
        ping.send(i.to_le_bytes())?;
        pong.receive()?;
    }

    let elapsed_ns = u128::from(timer.tick());
    responder.join().map_err(|_| BenchError::Panicked)??;

    let rtt_ns = elapsed_ns / u128::from(ITERATIONS);
    println!("{rtt_ns} ns RTT");
    Ok(())
}

fn main() {
    quartz::init_tracing();

    let (producer_cpu, consumer_cpu) = get_cpu_affinity();
    let capacity = env_or("CAPACITY", DEFAULT_CAPACITY);

    println!("quartz channel (capacity={capacity}, iters={ITERATIONS}):");
    let result = bench_throughput(capacity, producer_cpu, consumer_cpu)
        .and_then(|()| bench_rtt(producer_cpu, consumer_cpu));

    if let Err(e) = result {
        eprintln!("channel_bench: {e}");
        std::process::exit(1);
    }
}
