//! Register Settings Derived From a Line Encoding

use crate::error::ReconfigError;
use line_coding::regs::{bit, ucsra, ucsrb, ucsrc};
use line_coding::{double_speed_divisor, LineEncoding, Parity, StopBits};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with a data bit count outside 6..=8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBitsPolicy {
    /// Refuse the request and keep the current configuration
    #[default]
    Reject,
    /// Program 8 data bits instead
    ClampToEight,
    /// Leave the character size bits clear (5-bit frames)
    Legacy,
}

/// Complete register programming for one line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsartSettings {
    /// Encoding as it will actually be applied
    pub encoding: LineEncoding,
    /// Baud rate register
    pub ubrr: u16,
    /// Status/mode register A (double speed)
    pub ucsra: u8,
    /// Control register B (enables)
    pub ucsrb: u8,
    /// Control register C (frame format)
    pub ucsrc: u8,
}

impl UsartSettings {
    /// Compute register values for `encoding` without touching hardware
    pub fn derive(
        encoding: &LineEncoding,
        cpu_hz: u32,
        policy: DataBitsPolicy,
    ) -> Result<Self, ReconfigError> {
        let mut effective = *encoding;

        let mut mode = parity_mask(encoding.parity);

        if encoding.stop_bits == StopBits::Two {
            mode |= bit(ucsrc::USBS);
        }

        mode |= match data_bits_mask(encoding.data_bits) {
            Some(mask) => mask,
            None => match policy {
                DataBitsPolicy::Reject => {
                    return Err(ReconfigError::UnsupportedDataBits(encoding.data_bits))
                }
                DataBitsPolicy::ClampToEight => {
                    warn!(
                        "Data bit count {} unsupported, clamping to 8",
                        encoding.data_bits
                    );
                    effective.data_bits = 8;
                    bit(ucsrc::UCSZ1) | bit(ucsrc::UCSZ0)
                }
                DataBitsPolicy::Legacy => {
                    warn!(
                        "Data bit count {} unsupported, leaving character size bits clear",
                        encoding.data_bits
                    );
                    effective.data_bits = 5;
                    0
                }
            },
        };

        let ubrr = double_speed_divisor(cpu_hz, encoding.baud_rate)?;

        Ok(Self {
            encoding: effective,
            ubrr,
            ucsra: bit(ucsra::U2X),
            ucsrb: bit(ucsrb::RXCIE) | bit(ucsrb::TXEN) | bit(ucsrb::RXEN),
            ucsrc: mode,
        })
    }
}

fn parity_mask(parity: Parity) -> u8 {
    match parity {
        Parity::None => 0,
        Parity::Odd => bit(ucsrc::UPM1) | bit(ucsrc::UPM0),
        Parity::Even => bit(ucsrc::UPM1),
    }
}

fn data_bits_mask(data_bits: u8) -> Option<u8> {
    match data_bits {
        6 => Some(bit(ucsrc::UCSZ0)),
        7 => Some(bit(ucsrc::UCSZ1)),
        8 => Some(bit(ucsrc::UCSZ1) | bit(ucsrc::UCSZ0)),
        _ => None,
    }
}
