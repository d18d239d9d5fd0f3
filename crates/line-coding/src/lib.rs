//! Serial Line Encoding
//!
//! Framing parameters negotiated by the host side of the bridge (baud rate,
//! parity, stop bits, data bits), the 7-byte CDC `SET_LINE_CODING` payload
//! they travel in, and the USART register layout they are programmed into.

mod encoding;
mod error;
pub mod regs;

pub use encoding::{LineEncoding, Parity, StopBits, CDC_LINE_CODING_LEN};
pub use error::LineCodingError;
pub use regs::{double_speed_divisor, DEFAULT_CPU_HZ};
