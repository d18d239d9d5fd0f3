//! Bridge Error Types

use thiserror::Error;

/// Errors constructing a bridge loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Buffer capacity of zero
    #[error("Buffer capacity must be at least 1")]
    ZeroCapacity,

    /// Chunk size too small to send anything under the one-short rule
    #[error("Max chunk must be at least 2, got {0}")]
    ChunkTooSmall(usize),
}
