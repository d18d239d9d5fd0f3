//! USART Register Layout
//!
//! Bit positions of the AVR USART1 control/status registers and the
//! double-speed baud divisor.

use crate::error::LineCodingError;

/// Default CPU clock (Hz) the divisor is computed against
pub const DEFAULT_CPU_HZ: u32 = 16_000_000;

/// UBRRn is 12 bits wide
pub const UBRR_MAX: u16 = 0x0FFF;

/// UCSRnA bits
pub mod ucsra {
    /// Double transmission speed
    pub const U2X: u8 = 1;
}

/// UCSRnB bits
pub mod ucsrb {
    /// RX complete interrupt enable
    pub const RXCIE: u8 = 7;
    /// Receiver enable
    pub const RXEN: u8 = 4;
    /// Transmitter enable
    pub const TXEN: u8 = 3;
}

/// UCSRnC bits
pub mod ucsrc {
    /// Parity mode bit 1
    pub const UPM1: u8 = 5;
    /// Parity mode bit 0
    pub const UPM0: u8 = 4;
    /// Stop bit select
    pub const USBS: u8 = 3;
    /// Character size bit 1
    pub const UCSZ1: u8 = 2;
    /// Character size bit 0
    pub const UCSZ0: u8 = 1;
}

/// Single-bit mask
#[inline]
pub const fn bit(n: u8) -> u8 {
    1 << n
}

/// Baud rate register value for double-speed (U2X) mode.
///
/// `((cpu_hz / 8) + baud / 2) / baud - 1`, i.e. `cpu_hz / (8 * baud) - 1`
/// rounded to the nearest achievable rate.
pub fn double_speed_divisor(cpu_hz: u32, baud: u32) -> Result<u16, LineCodingError> {
    if baud == 0 {
        return Err(LineCodingError::InvalidBaudRate(baud));
    }

    let ticks = (u64::from(cpu_hz) / 8 + u64::from(baud) / 2) / u64::from(baud);
    if ticks == 0 {
        return Err(LineCodingError::InvalidBaudRate(baud));
    }

    let divisor = ticks - 1;
    if divisor > u64::from(UBRR_MAX) {
        return Err(LineCodingError::DivisorOutOfRange {
            baud,
            divisor,
            max: UBRR_MAX,
        });
    }

    Ok(divisor as u16)
}
