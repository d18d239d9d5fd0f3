//! Line Encoding Definitions

use crate::error::LineCodingError;
use serde::{Deserialize, Serialize};

/// Size of the CDC SET_LINE_CODING / GET_LINE_CODING payload
pub const CDC_LINE_CODING_LEN: usize = 7;

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// CDC bParityType value
    pub fn to_cdc(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
        }
    }

    /// Parse a CDC bParityType value. Mark (3) and Space (4) are not supported.
    pub fn from_cdc(value: u8) -> Result<Self, LineCodingError> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            other => Err(LineCodingError::UnsupportedParity(other)),
        }
    }
}

/// Stop bit count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl StopBits {
    /// CDC bCharFormat value
    pub fn to_cdc(self) -> u8 {
        match self {
            StopBits::One => 0,
            StopBits::Two => 2,
        }
    }

    /// Parse a CDC bCharFormat value. 1.5 stop bits (1) is not supported.
    pub fn from_cdc(value: u8) -> Result<Self, LineCodingError> {
        match value {
            0 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(LineCodingError::UnsupportedStopBits(other)),
        }
    }
}

/// Serial framing parameters requested by the host.
///
/// `data_bits` is kept as the raw value the host sent; whether a count outside
/// 6..=8 is rejected or coerced is decided where the encoding is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineEncoding {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Data bits per character
    pub data_bits: u8,
}

impl Default for LineEncoding {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: 8,
        }
    }
}

impl LineEncoding {
    /// Create a new line encoding
    pub fn new(baud_rate: u32, parity: Parity, stop_bits: StopBits, data_bits: u8) -> Self {
        Self {
            baud_rate,
            parity,
            stop_bits,
            data_bits,
        }
    }

    /// Decode a CDC line coding payload
    ///
    /// Layout: `dwDTERate` (u32 little-endian), `bCharFormat`, `bParityType`, `bDataBits`.
    pub fn from_cdc_bytes(bytes: &[u8]) -> Result<Self, LineCodingError> {
        if bytes.len() != CDC_LINE_CODING_LEN {
            return Err(LineCodingError::InvalidLength {
                expected: CDC_LINE_CODING_LEN,
                actual: bytes.len(),
            });
        }

        let baud_rate = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let stop_bits = StopBits::from_cdc(bytes[4])?;
        let parity = Parity::from_cdc(bytes[5])?;

        Ok(Self {
            baud_rate,
            parity,
            stop_bits,
            data_bits: bytes[6],
        })
    }

    /// Encode as a CDC line coding payload
    pub fn to_cdc_bytes(&self) -> [u8; CDC_LINE_CODING_LEN] {
        let rate = self.baud_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits.to_cdc(),
            self.parity.to_cdc(),
            self.data_bits,
        ]
    }
}

impl std::fmt::Display for LineEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {}{}{}", self.baud_rate, self.data_bits, parity, stop)
    }
}
