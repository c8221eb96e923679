//! Bounded blocking MPMC channel.
//!
//! A FIFO queue of [`Message`]s guarded by one mutex and two condition
//! variables (not-empty, not-full). Any number of threads may send and
//! receive through a shared `&Channel` (typically an `Arc<Channel>`).
//!
//! # Overview
//!
//! - [`Channel::send`] blocks while the queue holds `capacity` messages
//!   (backpressure), [`Channel::receive`] blocks while it is empty.
//! - `try_*` variants never block; `*_timeout` variants wait at most a
//!   [`Timeout`] and leave the queue untouched when it expires.
//! - [`Channel::close`] rejects further sends; receivers keep draining
//!   buffered messages in FIFO order and only then observe
//!   [`ChannelError::Closed`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use quartz::sync::channel::{Channel, ChannelError};
//!
//! let channel = Arc::new(Channel::with_capacity(2)?);
//!
//! let tx = Arc::clone(&channel);
//! let producer = std::thread::spawn(move || {
//!     for word in ["a", "b", "c"] {
//!         tx.send(word).unwrap();
//!     }
//!     tx.close();
//! });
//!
//! let mut received = Vec::new();
//! while let Ok(msg) = channel.receive() {
//!     received.push(msg.into_bytes());
//! }
//! producer.join().unwrap();
//!
//! assert_eq!(received, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
//! assert_eq!(channel.receive(), Err(ChannelError::Closed));
//! # Ok::<(), ChannelError>(())
//! ```
//!
//! # Ordering
//!
//! Enqueue and dequeue are totally ordered by mutex acquisition. Which of
//! several blocked producers (or consumers) proceeds first is unspecified;
//! every woken thread re-validates its predicate before acting.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use minstant::Instant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{DEFAULT_TAG, Message};
use crate::queue::list::{Detached, List};
use crate::trace::debug;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Errors returned by channel construction and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Capacity was zero at construction.
    #[error("channel capacity must be greater than 0")]
    InvalidCapacity,
    /// The queue node could not be allocated; the queue is unchanged.
    #[error("failed to allocate queue node")]
    AllocationFailure,
    /// The channel is closed (for receivers: closed and fully drained).
    #[error("channel is closed")]
    Closed,
    /// The deadline passed before the operation could proceed.
    #[error("channel operation timed out")]
    Timeout,
    /// Non-blocking send found the queue at capacity.
    #[error("channel is full")]
    Full,
    /// Non-blocking receive found the queue empty (but still open).
    #[error("channel is empty")]
    Empty,
}

/// Channel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Tag attached to messages sent as plain bytes.
    ///
    /// **Default**: 1.0
    pub priority_tag: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            priority_tag: DEFAULT_TAG,
        }
    }
}

impl ChannelConfig {
    /// Builder-style setter for the default message tag.
    #[must_use]
    pub const fn with_priority_tag(mut self, tag: f64) -> Self {
        self.priority_tag = tag;
        self
    }
}

/// How long an operation may block.
#[derive(Clone, Copy)]
enum Wait {
    Never,
    Forever,
    Until(Instant),
}

impl Wait {
    fn from_timeout(timeout: impl Into<Timeout>) -> Self {
        match timeout.into() {
            Timeout::Infinite => Self::Forever,
            Timeout::Duration(d) => Instant::now().checked_add(d).map_or(Self::Forever, Self::Until),
        }
    }
}

/// State guarded by the channel mutex.
struct State {
    list: List,
    closed: bool,
}

/// Bounded blocking multi-producer/multi-consumer FIFO channel.
///
/// Dropping the channel (or calling [`Channel::deinit`]) frees any messages
/// still buffered.
pub struct Channel {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    config: ChannelConfig,
}

impl Channel {
    /// Creates a channel holding at most `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidCapacity`] if `capacity == 0`.
    pub fn new(capacity: usize, config: ChannelConfig) -> Result<Self, ChannelError> {
        if capacity == 0 {
            return Err(ChannelError::InvalidCapacity);
        }
        debug!(capacity, priority_tag = config.priority_tag, "channel created");
        Ok(Self {
            state: Mutex::new(State {
                list: List::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            config,
        })
    }

    /// Creates a channel with [`ChannelConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidCapacity`] if `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Result<Self, ChannelError> {
        Self::new(capacity, ChannelConfig::default())
    }

    /// Sends `data` tagged with the configured priority tag, blocking while full.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel is or becomes closed while waiting.
    /// - [`ChannelError::AllocationFailure`] if the node could not be allocated.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        self.enqueue(self.wrap(data), Wait::Forever)
    }

    /// Sends a caller-tagged message, blocking while full.
    ///
    /// # Errors
    ///
    /// See [`Channel::send`].
    pub fn send_message(&self, message: Message) -> Result<(), ChannelError> {
        self.enqueue(message, Wait::Forever)
    }

    /// Attempts to send without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Full`] if the queue is at capacity, otherwise as
    /// [`Channel::send`].
    pub fn try_send(&self, data: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        self.enqueue(self.wrap(data), Wait::Never)
    }

    /// Attempts to send a caller-tagged message without blocking.
    ///
    /// # Errors
    ///
    /// See [`Channel::try_send`].
    pub fn try_send_message(&self, message: Message) -> Result<(), ChannelError> {
        self.enqueue(message, Wait::Never)
    }

    /// Sends `data`, waiting at most `timeout` for space.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Timeout`] if no space became available in time,
    /// otherwise as [`Channel::send`].
    pub fn send_timeout(
        &self,
        data: impl Into<Vec<u8>>,
        timeout: impl Into<Timeout>,
    ) -> Result<(), ChannelError> {
        self.enqueue(self.wrap(data), Wait::from_timeout(timeout))
    }

    /// Sends a caller-tagged message, waiting at most `timeout` for space.
    ///
    /// # Errors
    ///
    /// See [`Channel::send_timeout`].
    pub fn send_message_timeout(
        &self,
        message: Message,
        timeout: impl Into<Timeout>,
    ) -> Result<(), ChannelError> {
        self.enqueue(message, Wait::from_timeout(timeout))
    }

    /// Receives the oldest message, blocking while the channel is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] once the channel is closed and drained.
    pub fn receive(&self) -> Result<Message, ChannelError> {
        self.dequeue(Wait::Forever)
    }

    /// Attempts to receive without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Empty`] if nothing is buffered and the channel is
    /// open, [`ChannelError::Closed`] if nothing is buffered and it is closed.
    pub fn try_receive(&self) -> Result<Message, ChannelError> {
        self.dequeue(Wait::Never)
    }

    /// Receives the oldest message, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Timeout`] if nothing arrived in time, otherwise
    /// as [`Channel::receive`].
    pub fn receive_timeout(&self, timeout: impl Into<Timeout>) -> Result<Message, ChannelError> {
        self.dequeue(Wait::from_timeout(timeout))
    }

    /// Removes every buffered message, oldest first, and wakes blocked senders.
    pub fn drain(&self) -> Vec<Message> {
        let drained = self.lock().list.take_all();
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }

    /// Closes the channel.
    ///
    /// Blocked and future sends fail with [`ChannelError::Closed`]; receivers
    /// drain what is buffered, then observe `Closed`. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        debug!(pending = state.list.len(), "channel closed");
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Consumes the channel, freeing buffered messages.
    ///
    /// Returns the number of messages discarded. Dropping the channel releases
    /// them the same way; this form reports the count.
    pub fn deinit(self) -> usize {
        let mut state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let discarded = state.list.clear();
        debug!(discarded, "channel deinitialized");
        discarded
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().list.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().list.len() >= self.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn wrap(&self, data: impl Into<Vec<u8>>) -> Message {
        Message::tagged(data, self.config.priority_tag)
    }

    // No user code runs under this lock and list operations cannot unwind
    // halfway, so a poisoned guard still protects consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks on `condvar` according to `wait`.
    ///
    /// Returns `Err` with the error for a non-blocking or expired wait; the
    /// caller re-checks its predicate after every `Ok`, spurious or not.
    fn wait<'a>(
        condvar: &Condvar,
        guard: MutexGuard<'a, State>,
        wait: Wait,
        would_block: ChannelError,
    ) -> Result<MutexGuard<'a, State>, ChannelError> {
        match wait {
            Wait::Never => Err(would_block),
            Wait::Forever => Ok(condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)),
            Wait::Until(deadline) => {
                let remaining = match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return Err(ChannelError::Timeout),
                };
                let (guard, _) = condvar
                    .wait_timeout(guard, remaining)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(guard)
            }
        }
    }

    fn enqueue(&self, message: Message, wait: Wait) -> Result<(), ChannelError> {
        // Allocate before locking; on failure nothing has been touched.
        let node = Detached::try_new(message).map_err(|_| ChannelError::AllocationFailure)?;

        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(ChannelError::Closed);
            }
            if state.list.len() < self.capacity {
                break;
            }
            state = Self::wait(&self.not_full, state, wait, ChannelError::Full)?;
        }
        state.list.push_back(node);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    fn dequeue(&self, wait: Wait) -> Result<Message, ChannelError> {
        let mut state = self.lock();
        loop {
            if let Some(message) = state.list.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(message);
            }
            if state.closed {
                return Err(ChannelError::Closed);
            }
            state = Self::wait(&self.not_empty, state, wait, ChannelError::Empty)?;
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Channel")
            .field("len", &state.list.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .field("config", &self.config)
            .finish()
    }
}
