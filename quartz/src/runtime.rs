//! Runtime utilities for schedulers built on quartz.
//!
//! - `timing`: drift-tracking monotonic timer (single-owner, per-thread).

pub mod timing;
