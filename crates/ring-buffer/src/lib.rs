//! Byte Ring Buffer
//!
//! Fixed-capacity FIFO used to decouple the ingress and egress rates of the
//! serial bridge. Fullness is checked by the caller before inserting; the
//! buffer never overwrites queued bytes.

mod buffer;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};

use thiserror::Error;

/// Errors returned by guarded buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Insert attempted while the buffer was full
    #[error("ring buffer full ({capacity} bytes)")]
    Full { capacity: usize },
}
