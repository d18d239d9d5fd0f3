//! Reconfiguration Error Types

use line_coding::LineCodingError;
use thiserror::Error;

/// Errors raised while deriving or applying a serial configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconfigError {
    /// Data bit count outside 6..=8 under the `Reject` policy
    #[error("Unsupported data bit count {0} (expected 6, 7 or 8)")]
    UnsupportedDataBits(u8),

    /// Encoding could not be turned into register values
    #[error(transparent)]
    LineCoding(#[from] LineCodingError),

    /// Underlying port refused a control operation
    #[error("Serial control error: {0}")]
    Backend(String),

    /// Control state lock was poisoned by a panicking writer
    #[error("Serial control lock poisoned")]
    LockPoisoned,
}
