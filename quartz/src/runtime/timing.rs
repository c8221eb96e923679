//! Timing primitives.
//!
//! A [`Timer`] is owned by exactly one thread or context. It is `Send` but not
//! `Sync`: a scheduler that paces several workers gives each worker its own
//! timer rather than sharing one.

mod clock;
mod config;
mod timer;

pub use clock::{Clock, ManualClock, MonoClock};
pub use config::TimerConfig;
pub use timer::{DRIFT_SCALE, Timer, TimerError};
