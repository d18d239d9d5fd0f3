//! Line Coding Error Types

use thiserror::Error;

/// Errors decoding or converting a line encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineCodingError {
    /// Payload is not exactly 7 bytes
    #[error("Line coding payload must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// bParityType outside None/Odd/Even (Mark and Space included)
    #[error("Unsupported parity type {0}")]
    UnsupportedParity(u8),

    /// bCharFormat outside 1 or 2 stop bits
    #[error("Unsupported stop bit format {0}")]
    UnsupportedStopBits(u8),

    /// Baud rate of zero, or too fast for the clock
    #[error("Invalid baud rate {0}")]
    InvalidBaudRate(u32),

    /// Divisor does not fit the baud rate register
    #[error("Baud rate {baud} needs divisor {divisor}, register maximum is {max}")]
    DivisorOutOfRange { baud: u32, divisor: u64, max: u16 },
}
