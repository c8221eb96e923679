//! Core FIFO storage for the blocking channel.
//!
//! This module contains the intrusive singly-linked list that backs
//! [`crate::sync::channel`]. The list itself is not synchronized: every
//! operation takes `&mut self`, and the channel only calls it while holding
//! its mutex.

pub(crate) mod list;
