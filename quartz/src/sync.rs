//! Synchronization primitives for in-process communication.
//!
//! This module provides thread-safe queues for communication between OS
//! threads within the same process.

pub mod channel;
