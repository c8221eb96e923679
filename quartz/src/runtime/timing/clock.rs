//! Monotonic clock sources for [`Timer`](super::Timer).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use minstant::Instant;
use rustix::time::{ClockId, DynamicClockId, clock_gettime_dynamic};

use super::timer::TimerError;

/// A source of monotonic nanosecond readings.
pub trait Clock {
    /// Nanoseconds since a fixed, clock-specific origin. Never decreases.
    fn now_ns(&self) -> u64;
}

/// The platform monotonic clock.
///
/// Readings come from `minstant` (TSC where usable, `CLOCK_MONOTONIC`
/// otherwise) relative to an anchor taken at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonoClock {
    anchor: Instant,
}

impl MonoClock {
    /// Probes `CLOCK_MONOTONIC` and anchors the clock at the current instant.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ClockUnavailable`] if the platform cannot provide
    /// a monotonic clock.
    pub fn new() -> Result<Self, TimerError> {
        clock_gettime_dynamic(DynamicClockId::Known(ClockId::Monotonic))
            .map_err(TimerError::ClockUnavailable)?;
        Ok(Self {
            anchor: Instant::now(),
        })
    }
}

impl Clock for MonoClock {
    #[inline]
    fn now_ns(&self) -> u64 {
        u64::try_from(self.anchor.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// A manually advanced clock for deterministic tests and simulation.
///
/// Clones share the same reading, so a test can keep one handle and move
/// another into the timer under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    /// Moves the clock forward by `delta_ns`, saturating at `u64::MAX`.
    pub fn advance(&self, delta_ns: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(delta_ns))
            });
    }

    /// Sets the reading to `now_ns`.
    ///
    /// Setting an earlier value breaks the monotonic contract; timers treat a
    /// backwards step as zero elapsed time.
    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
