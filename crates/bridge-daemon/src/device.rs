//! Device-Side Hardware Serial Port
//!
//! Data-path handles (non-blocking byte read/write) and the control handle
//! the reconfigurator drives. All handles are clones of one open port.

use crate::error::DaemonError;
use line_coding::{LineEncoding, Parity, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity as SerialParity, SerialPort,
    StopBits as SerialStopBits,
};
use tracing::{debug, info};
use usart::{ReconfigError, SerialControl, UsartSettings};

/// Open the port at `path` framed as `encoding`, with zero read/write timeout
pub fn open(path: &str, encoding: &LineEncoding) -> Result<Box<dyn SerialPort>, DaemonError> {
    info!("Opening serial device {} ({})", path, encoding);

    let port = tokio_serial::new(path, encoding.baud_rate)
        .data_bits(to_data_bits(encoding.data_bits))
        .parity(to_parity(encoding.parity))
        .stop_bits(to_stop_bits(encoding.stop_bits))
        .flow_control(FlowControl::None)
        .timeout(Duration::ZERO)
        .open()?;

    Ok(port)
}

/// Non-blocking byte access to the device port
pub struct DeviceData {
    port: Box<dyn SerialPort>,
}

impl DeviceData {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Read one byte if available
    pub fn try_read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            Ok(_) => None,
            Err(e) if is_transient(&e) => None,
            Err(e) => {
                debug!("Device read failed: {}", e);
                None
            }
        }
    }

    /// Write one byte; `Ok(false)` if the port cannot take it right now
    pub fn try_write_byte(&mut self, byte: u8) -> io::Result<bool> {
        match self.port.write(&[byte]) {
            Ok(1) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) if is_transient(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Control state of the device port.
///
/// The OS driver computes its own divisor, so only the framing carried in
/// [`UsartSettings::encoding`] is applied; register values are informational.
pub struct DeviceControl {
    port: Box<dyn SerialPort>,
}

impl DeviceControl {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl SerialControl for DeviceControl {
    fn disable(&mut self) -> Result<(), ReconfigError> {
        // Accepted output goes out under the old settings; unread input is dropped
        self.port.flush().map_err(backend)?;
        self.port.clear(ClearBuffer::Input).map_err(backend)
    }

    fn program(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError> {
        let encoding = &settings.encoding;
        self.port
            .set_baud_rate(encoding.baud_rate)
            .map_err(backend)?;
        self.port
            .set_data_bits(to_data_bits(encoding.data_bits))
            .map_err(backend)?;
        self.port
            .set_parity(to_parity(encoding.parity))
            .map_err(backend)?;
        self.port
            .set_stop_bits(to_stop_bits(encoding.stop_bits))
            .map_err(backend)
    }

    fn enable(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError> {
        debug!(
            "Device port enabled at {} (UBRR equivalent {})",
            settings.encoding, settings.ubrr
        );
        Ok(())
    }
}

fn backend(e: impl std::fmt::Display) -> ReconfigError {
    ReconfigError::Backend(e.to_string())
}

pub(crate) fn to_parity(parity: Parity) -> SerialParity {
    match parity {
        Parity::None => SerialParity::None,
        Parity::Odd => SerialParity::Odd,
        Parity::Even => SerialParity::Even,
    }
}

pub(crate) fn to_stop_bits(stop_bits: StopBits) -> SerialStopBits {
    match stop_bits {
        StopBits::One => SerialStopBits::One,
        StopBits::Two => SerialStopBits::Two,
    }
}

pub(crate) fn to_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}
