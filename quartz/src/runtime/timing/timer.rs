//! Drift-compensated monotonic timer.
//!
//! Each [`Timer::tick`] measures the time since the previous tick, grows the
//! accumulated drift in proportion to that interval, and reports the interval
//! scaled by `1 + drift`. [`Timer::sleep`] applies the inverse scaling so a
//! caller pacing itself in "drifted" time sleeps for the matching real time.
//!
//! Drift is unbounded; callers that need it bounded call [`Timer::reset`]
//! periodically.

use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Duration;

use thiserror::Error;

use super::clock::{Clock, MonoClock};
use super::config::TimerConfig;
use crate::trace::{debug, trace};

/// Scale applied to `drift_coefficient * elapsed_ns` on every tick.
pub const DRIFT_SCALE: f64 = 1e-12;

/// Errors from timer construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The platform has no usable monotonic clock.
    #[error("monotonic clock unavailable: {0}")]
    ClockUnavailable(rustix::io::Errno),
    /// A configuration field is out of range.
    #[error("invalid timer config: {0}")]
    InvalidConfig(&'static str),
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Single-owner monotonic timer with accumulated drift.
///
/// # Thread Safety
///
/// `Timer` is [`Send`] but **not** [`Sync`]: it can move to the thread that
/// owns it, but is never shared. Give each worker its own timer, or wrap one
/// in external synchronization.
pub struct Timer<C: Clock = MonoClock> {
    clock: C,
    last_tick: u64,
    drift: f64,
    config: TimerConfig,
    _unsync: PhantomUnsync,
}

impl Timer {
    /// Creates a timer on the platform monotonic clock.
    ///
    /// # Errors
    ///
    /// - [`TimerError::ClockUnavailable`] if no monotonic clock exists.
    /// - [`TimerError::InvalidConfig`] if `config` is out of range.
    pub fn new(config: TimerConfig) -> Result<Self, TimerError> {
        Self::with_clock(config, MonoClock::new()?)
    }
}

impl<C: Clock> Timer<C> {
    /// Creates a timer reading from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidConfig`] if `config` is out of range.
    pub fn with_clock(config: TimerConfig, clock: C) -> Result<Self, TimerError> {
        config.validate()?;
        debug!(
            precision_ns = config.precision_ns,
            base_frequency_hz = config.base_frequency_hz,
            drift_coefficient = config.drift_coefficient,
            "timer created"
        );
        let last_tick = clock.now_ns();
        Ok(Self {
            clock,
            last_tick,
            drift: 0.0,
            config,
            _unsync: PhantomData,
        })
    }

    /// Returns the drift-scaled nanoseconds elapsed since the previous tick
    /// (or construction, or [`Timer::reset`]).
    pub fn tick(&mut self) -> u64 {
        let now = self.clock.now_ns();
        // A clock that steps backwards reports zero elapsed time.
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;

        let elapsed = elapsed as f64;
        self.drift += self.config.drift_coefficient * elapsed * DRIFT_SCALE;
        saturate_ns(elapsed * (1.0 + self.drift))
    }

    /// Real nanoseconds that correspond to `duration_ns` of drifted time.
    ///
    /// Zero when the drift factor is non-positive or the result is not finite.
    #[must_use]
    pub fn compensated(&self, duration_ns: u64) -> u64 {
        let adjusted = duration_ns as f64 / (1.0 + self.drift);
        if adjusted.is_finite() {
            saturate_ns(adjusted)
        } else {
            0
        }
    }

    /// Sleeps the current thread for [`Timer::compensated`]`(duration_ns)`.
    ///
    /// Best-effort: the OS may oversleep, and nothing is reported back.
    pub fn sleep(&self, duration_ns: u64) {
        let adjusted = self.compensated(duration_ns);
        if adjusted > 0 {
            std::thread::sleep(Duration::from_nanos(adjusted));
        }
    }

    /// Clears accumulated drift and restarts interval measurement from now.
    pub fn reset(&mut self) {
        trace!(drift = self.drift, "timer reset");
        self.drift = 0.0;
        self.last_tick = self.clock.now_ns();
    }

    /// Accumulated unitless drift.
    #[inline]
    #[must_use]
    pub const fn drift(&self) -> f64 {
        self.drift
    }

    /// Clock reading taken by the last tick or reset.
    #[inline]
    #[must_use]
    pub const fn last_tick(&self) -> u64 {
        self.last_tick
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TimerConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> std::fmt::Debug for Timer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("last_tick", &self.last_tick)
            .field("drift", &self.drift)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Rounds to whole nanoseconds, clamping negatives and NaN to zero and
/// saturating at `u64::MAX`.
#[inline]
fn saturate_ns(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        // `as` saturates for out-of-range floats.
        value.round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::timing::ManualClock;

    fn manual_timer(coefficient: f64) -> (Timer<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000);
        let config = TimerConfig::default().with_drift_coefficient(coefficient);
        let timer = Timer::with_clock(config, clock.clone()).unwrap();
        (timer, clock)
    }

    #[test]
    fn tick_without_drift_reports_elapsed() {
        let (mut timer, clock) = manual_timer(0.0);

        clock.advance(250);
        assert_eq!(timer.tick(), 250);
        assert_eq!(timer.last_tick(), 1_250);

        assert_eq!(timer.tick(), 0);

        clock.advance(1_000_000);
        assert_eq!(timer.tick(), 1_000_000);
        assert_eq!(timer.drift(), 0.0);
    }

    #[test]
    fn drift_accumulates_per_tick() {
        // 1e3 * 1e9ns * 1e-12 = 1.0 drift per simulated second.
        let (mut timer, clock) = manual_timer(1e3);

        clock.advance(1_000_000_000);
        assert_eq!(timer.tick(), 2_000_000_000);
        assert!((timer.drift() - 1.0).abs() < 1e-12);

        clock.advance(1_000_000_000);
        assert_eq!(timer.tick(), 3_000_000_000);
        assert!((timer.drift() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn negative_drift_clamps_to_zero() {
        let (mut timer, clock) = manual_timer(-2e3);

        clock.advance(1_000_000_000);
        // drift = -2.0, factor = -1.0
        assert_eq!(timer.tick(), 0);
        assert_eq!(timer.compensated(1_000), 0);
    }

    #[test]
    fn zero_factor_compensates_to_zero() {
        let (mut timer, clock) = manual_timer(-1e3);

        clock.advance(1_000_000_000);
        timer.tick();
        assert!((timer.drift() + 1.0).abs() < 1e-12);
        assert_eq!(timer.compensated(1_000_000), 0);
    }

    #[test]
    fn compensated_sleep_inverts_drift() {
        let (mut timer, clock) = manual_timer(1e3);
        assert_eq!(timer.compensated(1_000_000), 1_000_000);

        clock.advance(1_000_000_000);
        timer.tick();
        assert_eq!(timer.compensated(1_000_000), 500_000);
    }

    #[test]
    fn reset_clears_drift_and_restarts_interval() {
        let (mut timer, clock) = manual_timer(1e3);

        clock.advance(1_000_000_000);
        timer.tick();
        assert!(timer.drift() > 0.0);

        clock.advance(400);
        timer.reset();
        assert_eq!(timer.drift(), 0.0);
        assert_eq!(timer.last_tick(), clock.now_ns());

        clock.advance(100);
        assert_eq!(timer.tick(), 100);
    }

    #[test]
    fn backwards_clock_reports_zero_elapsed() {
        let (mut timer, clock) = manual_timer(0.0);
        clock.advance(500);
        timer.tick();

        clock.set(0);
        assert_eq!(timer.tick(), 0);

        clock.set(300);
        assert_eq!(timer.tick(), 300);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = TimerConfig::default().with_precision_ns(0);
        assert!(matches!(
            Timer::with_clock(config, ManualClock::default()),
            Err(TimerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn real_clock_ticks_track_wall_time() {
        let config = TimerConfig::default();
        let mut timer = Timer::new(config).unwrap();

        let wall = std::time::Instant::now();
        timer.reset();
        let start = timer.last_tick();

        let mut previous = start;
        let mut total = 0u64;
        for round in 0..200 {
            if round % 50 == 0 {
                std::thread::sleep(Duration::from_micros(100));
            }
            total += timer.tick();
            assert!(timer.last_tick() >= previous, "last_tick went backwards");
            previous = timer.last_tick();
        }
        let end = timer.last_tick();
        let wall_ns = u64::try_from(wall.elapsed().as_nanos()).unwrap();

        // Zero drift: ticks partition the span exactly.
        assert_eq!(total, end - start);
        assert_eq!(timer.drift(), 0.0);
        assert!(
            total.abs_diff(wall_ns) <= config.precision_ns,
            "ticks {total}ns vs wall {wall_ns}ns"
        );
    }

    #[test]
    fn sleep_then_tick_is_within_tolerance() {
        let config = TimerConfig::default();
        let tolerance = 3 * config.precision_ns;
        let mut timer = Timer::new(config).unwrap();

        timer.tick();
        timer.sleep(1_000_000);
        let elapsed = timer.tick();

        assert!(elapsed >= 1_000_000, "slept only {elapsed}ns");
        assert!(elapsed - 1_000_000 <= tolerance, "overslept: {elapsed}ns");
    }

    #[test]
    fn saturate_ns_edges() {
        assert_eq!(saturate_ns(f64::NAN), 0);
        assert_eq!(saturate_ns(-5.0), 0);
        assert_eq!(saturate_ns(1.4), 1);
        assert_eq!(saturate_ns(1.5), 2);
        assert_eq!(saturate_ns(f64::INFINITY), u64::MAX);
    }

    #[test]
    fn timer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Timer>();
        assert_send::<Timer<ManualClock>>();
    }
}
