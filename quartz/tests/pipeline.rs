//! End-to-end tests: producer/consumer pipelines over the blocking channel,
//! paced by per-thread timers.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=quartz=debug cargo test --features tracing --test pipeline -- --nocapture
//! ```

use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use quartz::{Channel, ChannelConfig, ChannelError, ManualClock, Message, Timer, TimerConfig};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        quartz::init_tracing();
    });
}

#[test]
fn backpressure_releases_exactly_one_sender_per_receive() {
    init_test_tracing();
    let channel = Arc::new(Channel::with_capacity(2).unwrap());
    channel.send("a").unwrap();
    channel.send("b").unwrap();

    let tx = Arc::clone(&channel);
    let blocked = thread::spawn(move || tx.send("c"));

    thread::sleep(Duration::from_millis(50));
    assert!(!blocked.is_finished());

    assert_eq!(channel.receive().unwrap().bytes(), b"a");
    blocked.join().unwrap().unwrap();

    let rest: Vec<_> = channel.drain().into_iter().map(Message::into_bytes).collect();
    assert_eq!(rest, vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn multi_stage_pipeline_preserves_per_producer_order() {
    init_test_tracing();
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 250;

    let stage1 = Arc::new(Channel::with_capacity(8).unwrap());
    let stage2 = Arc::new(Channel::with_capacity(4).unwrap());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let tx = Arc::clone(&stage1);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let mut bytes = p.to_le_bytes().to_vec();
                    bytes.extend_from_slice(&seq.to_le_bytes());
                    tx.send(bytes).unwrap();
                }
            })
        })
        .collect();

    // Single forwarder keeps stage1 order intact into stage2.
    let forwarder = {
        let rx = Arc::clone(&stage1);
        let tx = Arc::clone(&stage2);
        thread::spawn(move || {
            while let Ok(msg) = rx.receive() {
                tx.send_message(msg).unwrap();
            }
            tx.close();
        })
    };

    let consumer = {
        let rx = Arc::clone(&stage2);
        thread::spawn(move || {
            let mut next = vec![0u32; PRODUCERS as usize];
            let mut total = 0;
            while let Ok(msg) = rx.receive() {
                let bytes = msg.bytes();
                let p = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
                let seq = u32::from_le_bytes(bytes[4..].try_into().unwrap());
                assert_eq!(seq, next[p], "producer {p} out of order");
                next[p] += 1;
                total += 1;
            }
            total
        })
    };

    for handle in producers {
        handle.join().unwrap();
    }
    stage1.close();
    forwarder.join().unwrap();

    assert_eq!(consumer.join().unwrap(), PRODUCERS * PER_PRODUCER);
    assert_eq!(stage2.receive(), Err(ChannelError::Closed));
}

#[test]
fn closed_channel_drains_before_reporting_closed() {
    init_test_tracing();
    let channel = Channel::new(4, ChannelConfig::default()).unwrap();
    channel.send("one").unwrap();
    channel.send("two").unwrap();

    channel.close();

    assert_eq!(channel.receive().unwrap().bytes(), b"one");
    assert_eq!(channel.receive().unwrap().bytes(), b"two");
    assert_eq!(channel.receive(), Err(ChannelError::Closed));
    assert_eq!(channel.deinit(), 0);
}

#[test]
fn shutdown_with_pending_messages_frees_them() {
    init_test_tracing();
    let channel = Arc::new(Channel::with_capacity(16).unwrap());
    for i in 0..10u8 {
        channel.send(vec![i; 64]).unwrap();
    }
    channel.close();

    let channel = Arc::try_unwrap(channel).unwrap();
    assert_eq!(channel.deinit(), 10);
}

#[test]
fn paced_workers_each_own_a_timer() {
    init_test_tracing();
    const WORKERS: usize = 3;
    const ROUNDS: u32 = 5;
    const PERIOD_NS: u64 = 200_000;

    let results = Arc::new(Channel::with_capacity(WORKERS).unwrap());

    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let tx = Arc::clone(&results);
            let mut timer = Timer::new(TimerConfig::default()).unwrap();
            thread::spawn(move || {
                timer.tick();
                let mut paced = 0u64;
                for _ in 0..ROUNDS {
                    timer.sleep(PERIOD_NS);
                    paced += timer.tick();
                }
                tx.send_message(Message::tagged(paced.to_le_bytes(), w as f64))
                    .unwrap();
            })
        })
        .collect();

    let mut seen = Vec::new();
    for _ in 0..WORKERS {
        let msg = results.receive().unwrap();
        let paced = u64::from_le_bytes(msg.bytes().try_into().unwrap());
        assert!(paced >= u64::from(ROUNDS) * PERIOD_NS, "worker undersleeping: {paced}ns");
        seen.push(msg.tag() as usize);
    }
    for handle in workers {
        handle.join().unwrap();
    }

    seen.sort_unstable();
    assert_eq!(seen, (0..WORKERS).collect::<Vec<_>>());
}

#[test]
fn simulated_drift_shortens_compensated_sleep() {
    let clock = ManualClock::new(0);
    let config = TimerConfig::default().with_drift_coefficient(500.0);
    let mut timer = Timer::with_clock(config, clock.clone()).unwrap();

    // 500 * 1e9 * 1e-12 = 0.5 drift after one simulated second.
    clock.advance(1_000_000_000);
    assert_eq!(timer.tick(), 1_500_000_000);
    assert_eq!(timer.compensated(3_000_000), 2_000_000);

    timer.reset();
    assert_eq!(timer.compensated(3_000_000), 3_000_000);
}

#[test]
fn receive_timeout_does_not_consume_later_messages() {
    init_test_tracing();
    let channel = Channel::with_capacity(1).unwrap();
    assert_eq!(
        channel.receive_timeout(Duration::from_millis(10)),
        Err(ChannelError::Timeout)
    );
    channel.send("after").unwrap();
    assert_eq!(channel.len(), 1);
    assert_eq!(channel.receive().unwrap().bytes(), b"after");
}
