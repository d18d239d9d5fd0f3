//! Fixed-Capacity Byte Ring Buffer Implementation

use crate::BufferError;

/// Default buffer capacity in bytes
pub const DEFAULT_CAPACITY: usize = 128;

/// Byte FIFO over a flat array with wraparound indices.
///
/// The split between [`peek`](RingBuffer::peek) and [`remove`](RingBuffer::remove)
/// lets a sender look at the head byte, attempt delivery, and only dequeue once
/// delivery is confirmed.
pub struct RingBuffer {
    /// Pre-allocated storage
    storage: Box<[u8]>,
    /// Index of the oldest byte
    head: usize,
    /// Number of occupied slots
    count: usize,
    /// Total bytes inserted (for statistics)
    total_inserted: u64,
    /// Total bytes removed (for statistics)
    total_removed: u64,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            count: 0,
            total_inserted: 0,
            total_removed: 0,
        }
    }

    /// Create a buffer with default capacity (128 bytes)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a byte at the tail.
    ///
    /// Callers are expected to check [`is_full`](Self::is_full) first. If they
    /// don't, the byte is refused and the buffer is left untouched.
    pub fn insert(&mut self, byte: u8) -> Result<(), BufferError> {
        if self.is_full() {
            return Err(BufferError::Full {
                capacity: self.capacity(),
            });
        }

        let tail = (self.head + self.count) % self.capacity();
        self.storage[tail] = byte;
        self.count += 1;
        self.total_inserted += 1;
        Ok(())
    }

    /// Return the head byte without removing it
    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.head])
        }
    }

    /// Discard the head byte, returning it
    pub fn remove(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        self.total_removed += 1;
        Some(byte)
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Free slots remaining
    pub fn free(&self) -> usize {
        self.capacity() - self.count
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.count as f64 / self.capacity() as f64
    }

    /// Get total bytes inserted since construction
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted
    }

    /// Get total bytes removed since construction
    pub fn total_removed(&self) -> u64 {
        self.total_removed
    }

    /// Drop all queued bytes
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.count)
            .field("head", &self.head)
            .finish()
    }
}
