//! Fixed-capacity byte ring used by both codec directions.

/// Byte FIFO of exactly `N` bytes addressed by offsets from its head.
///
/// Pushes are all-or-nothing, so a caller can test [`RingBuffer::available`]
/// or rely on the boolean result and roll back with [`RingBuffer::truncate`].
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    bytes: [u8; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty ring.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            head: 0,
            len: 0,
        }
    }

    /// Total number of bytes the ring can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes currently held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no byte is held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` when no further byte fits.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Number of bytes that can still be pushed.
    #[must_use]
    pub const fn available(&self) -> usize {
        N - self.len
    }

    const fn wrap(index: usize) -> usize {
        if index >= N { index - N } else { index }
    }

    const fn tail(&self) -> usize {
        Self::wrap(self.head + self.len)
    }

    /// Appends `data` at the tail, or leaves the ring untouched when it does
    /// not fit entirely.
    pub fn push(&mut self, data: &[u8]) -> bool {
        if data.len() > self.available() {
            return false;
        }
        for &byte in data {
            let tail = self.tail();
            if let Some(slot) = self.bytes.get_mut(tail) {
                *slot = byte;
            }
            self.len += 1;
        }
        true
    }

    /// Returns the byte `offset` positions after the head.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        self.bytes.get(Self::wrap(self.head + offset)).copied()
    }

    /// Iterates over the held bytes from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).filter_map(|offset| self.get(offset))
    }

    /// Drops up to `count` bytes from the head.
    pub fn discard(&mut self, count: usize) {
        let count = count.min(self.len);
        self.head = Self::wrap(self.head + count);
        self.len -= count;
        if self.len == 0 {
            self.head = 0;
        }
    }

    /// Drops bytes from the tail so that at most `len` remain.
    pub const fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Removes every byte.
    pub const fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Longest contiguous run of held bytes starting at the head.
    #[must_use]
    pub fn readable(&self) -> &[u8] {
        let end = (self.head + self.len).min(N);
        self.bytes.get(self.head..end).unwrap_or_default()
    }

    /// Longest contiguous run of free bytes starting at the tail.
    ///
    /// Bytes written there become part of the ring after
    /// [`RingBuffer::commit`].
    pub fn writable(&mut self) -> &mut [u8] {
        if self.len == 0 {
            self.head = 0;
        }
        if self.is_full() {
            return &mut [];
        }
        let tail = self.tail();
        let end = if tail >= self.head { N } else { self.head };
        self.bytes.get_mut(tail..end).unwrap_or_default()
    }

    /// Accounts for `count` bytes written into [`RingBuffer::writable`].
    pub fn commit(&mut self, count: usize) {
        self.len = (self.len + count).min(N);
    }
}
