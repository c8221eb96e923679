//! Timer configuration.
//!
//! The defaults model a 32.768 kHz watch crystal read at millisecond
//! precision with no drift. Only `drift_coefficient` affects arithmetic;
//! `precision_ns` and `base_frequency_hz` describe the clock for callers that
//! pick tolerances or tick periods from them.

use serde::{Deserialize, Serialize};

use super::timer::TimerError;

/// Configuration for a [`Timer`](super::Timer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Expected resolution of the clock, in nanoseconds. Informational.
    ///
    /// **Default**: 1ms
    pub precision_ns: u64,

    /// Nominal oscillator frequency. Informational.
    ///
    /// **Default**: 32768 Hz
    pub base_frequency_hz: f64,

    /// Drift accumulated per elapsed nanosecond, scaled by 1e-12.
    ///
    /// Zero disables drift. Negative values slow the reported time down.
    ///
    /// **Default**: 0.0
    pub drift_coefficient: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            precision_ns: 1_000_000,
            base_frequency_hz: 32_768.0,
            drift_coefficient: 0.0,
        }
    }
}

impl TimerConfig {
    /// Builder-style setter for clock precision.
    #[must_use]
    pub const fn with_precision_ns(mut self, precision_ns: u64) -> Self {
        self.precision_ns = precision_ns;
        self
    }

    /// Builder-style setter for the nominal oscillator frequency.
    #[must_use]
    pub const fn with_base_frequency_hz(mut self, hz: f64) -> Self {
        self.base_frequency_hz = hz;
        self
    }

    /// Builder-style setter for the drift coefficient.
    #[must_use]
    pub const fn with_drift_coefficient(mut self, coefficient: f64) -> Self {
        self.drift_coefficient = coefficient;
        self
    }

    /// Nominal oscillator period in nanoseconds.
    #[must_use]
    pub fn period_ns(&self) -> f64 {
        1e9 / self.base_frequency_hz
    }

    pub(crate) fn validate(&self) -> Result<(), TimerError> {
        if self.precision_ns == 0 {
            return Err(TimerError::InvalidConfig("precision_ns must be > 0"));
        }
        if !self.base_frequency_hz.is_finite() || self.base_frequency_hz <= 0.0 {
            return Err(TimerError::InvalidConfig(
                "base_frequency_hz must be finite and > 0",
            ));
        }
        if !self.drift_coefficient.is_finite() {
            return Err(TimerError::InvalidConfig("drift_coefficient must be finite"));
        }
        Ok(())
    }
}
