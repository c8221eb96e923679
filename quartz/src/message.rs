//! Owned payload carried through a [`Channel`](crate::Channel).

/// Tag applied to messages when the sender does not choose one.
pub const DEFAULT_TAG: f64 = 1.0;

/// An owned byte buffer plus an opaque scalar tag.
///
/// The tag has no effect on queue ordering; it travels with the payload so
/// that consumers (or a future prioritizing scheduler) can inspect it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    bytes: Vec<u8>,
    tag: f64,
}

impl Message {
    /// Creates a message with [`DEFAULT_TAG`].
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self::tagged(bytes, DEFAULT_TAG)
    }

    /// Creates a message with an explicit tag.
    #[must_use]
    pub fn tagged(bytes: impl Into<Vec<u8>>, tag: f64) -> Self {
        Self {
            bytes: bytes.into(),
            tag,
        }
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub const fn tag(&self) -> f64 {
        self.tag
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the message, returning the owned buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Consumes the message, returning buffer and tag.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, f64) {
        (self.bytes, self.tag)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
