//! Intrusive singly-linked FIFO list.
//!
//! # Layout
//!
//! - `head` owns the whole chain: every node reachable from it was produced by
//!   [`Detached::try_new`] and is released exactly once, either by
//!   [`List::pop_front`] or by `Drop`.
//! - `tail` is a non-owning pointer to the last node, giving O(1) append.
//!
//! Nodes are allocated through the global allocator directly so that an
//! allocation failure surfaces as a value instead of aborting the process.
//! Allocation happens in [`Detached::try_new`], before the caller takes any
//! lock; linking a detached node never allocates.

use std::alloc::{self, Layout};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::message::Message;

/// A list element owning exactly one message.
pub(crate) struct Node {
    message: Message,
    next: Option<NonNull<Node>>,
}

/// A heap node that has been allocated but not yet linked into a [`List`].
///
/// Dropping a detached node frees it along with its message.
pub(crate) struct Detached(NonNull<Node>);

// SAFETY: Detached uniquely owns its heap node; Message is Send.
unsafe impl Send for Detached {}

impl Detached {
    /// Allocates a node for `message`.
    ///
    /// # Errors
    ///
    /// Returns the message back if the allocator could not satisfy the request.
    pub(crate) fn try_new(message: Message) -> Result<Self, Message> {
        let layout = Layout::new::<Node>();
        // SAFETY: Node is not zero-sized, so the layout is valid for `alloc`.
        let raw = unsafe { alloc::alloc(layout) }.cast::<Node>();
        let Some(ptr) = NonNull::new(raw) else {
            return Err(message);
        };
        // SAFETY: ptr is freshly allocated with Node's layout and is not aliased.
        unsafe {
            ptr.as_ptr().write(Node {
                message,
                next: None,
            });
        }
        Ok(Self(ptr))
    }
}

impl Drop for Detached {
    fn drop(&mut self) {
        // SAFETY: the node was allocated with Node's layout by the global
        // allocator, as `Box::from_raw` requires, and is released only here.
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}

/// Unsynchronized FIFO of [`Node`]s.
///
/// Invariants:
/// - `len == 0` iff `head` is `None` iff `tail` is `None`.
/// - when `tail` is set, `tail.next` is `None`.
pub(crate) struct List {
    head: Option<NonNull<Node>>,
    tail: Option<NonNull<Node>>,
    len: usize,
}

// SAFETY: List owns every node reachable from `head`; no pointer into the
// chain escapes it, and Message is Send.
unsafe impl Send for List {}

impl List {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Links a detached node after the current tail. Never allocates.
    pub(crate) fn push_back(&mut self, node: Detached) {
        let ptr = ManuallyDrop::new(node).0;
        // SAFETY: ptr is a live node uniquely owned by `node`, which ownership
        // now passes to the list. Its `next` is None from construction.
        debug_assert!(unsafe { ptr.as_ref() }.next.is_none());

        match self.tail {
            None => self.head = Some(ptr),
            Some(mut tail) => {
                // SAFETY: tail points at the last live node of this list, and
                // `&mut self` guarantees no other reference into the chain.
                unsafe { tail.as_mut().next = Some(ptr) };
            }
        }
        self.tail = Some(ptr);
        self.len += 1;
    }

    /// Unlinks the head node and returns its message.
    pub(crate) fn pop_front(&mut self) -> Option<Message> {
        let head = self.head?;
        // SAFETY: head was linked by `push_back` from a Detached node and is
        // released here exactly once; it is no longer reachable afterwards.
        let node = unsafe { Box::from_raw(head.as_ptr()) };
        self.head = node.next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(node.message)
    }

    /// Unlinks every node, returning the messages in FIFO order.
    pub(crate) fn take_all(&mut self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(msg) = self.pop_front() {
            out.push(msg);
        }
        out
    }

    /// Frees every node, returning how many were released.
    pub(crate) fn clear(&mut self) -> usize {
        let mut freed = 0;
        while self.pop_front().is_some() {
            freed += 1;
        }
        freed
    }
}

impl Drop for List {
    fn drop(&mut self) {
        // Iterative release: a recursive drop would overflow on long chains.
        self.clear();
    }
}
