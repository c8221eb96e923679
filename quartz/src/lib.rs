//! Blocking concurrency and timing primitives.
//!
//! - [`sync::channel`]: bounded multi-producer/multi-consumer FIFO channel with
//!   backpressure, deadlines and drain-then-close shutdown.
//! - [`runtime::timing`]: single-owner monotonic timer with accumulated drift
//!   and drift-compensated sleep.

pub mod message;
pub(crate) mod queue;
pub mod runtime;
pub mod sync;
mod trace;

pub use message::Message;
pub use runtime::timing::{Clock, ManualClock, MonoClock, Timer, TimerConfig, TimerError};
pub use sync::channel::{Channel, ChannelConfig, ChannelError, Timeout};
pub use trace::init_tracing;

// Re-export serde traits for config documents
pub use serde::{Deserialize, Serialize};
