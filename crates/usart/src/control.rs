//! Serial Port Control State Machine
//!
//! A port is reprogrammed by walking `Disabled -> Programmed -> Enabled`.
//! Each step consumes the previous one, so the order cannot be skipped or
//! reversed, and a failure anywhere after `disable` leaves the port off.

use crate::error::ReconfigError;
use crate::settings::UsartSettings;

/// Control-register access to a hardware serial port
pub trait SerialControl {
    /// Turn off transmitter, receiver and interrupts, clearing all mode state
    fn disable(&mut self) -> Result<(), ReconfigError>;

    /// Write the baud divisor and frame format while disabled
    fn program(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError>;

    /// Re-enable transmitter, receiver and receive interrupt in one write
    fn enable(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError>;
}

/// Port with all control state cleared
pub struct Disabled<'a, C: SerialControl + ?Sized> {
    port: &'a mut C,
}

/// Port holding new divisor and mode, not yet enabled
pub struct Programmed<'a, C: SerialControl + ?Sized> {
    port: &'a mut C,
    settings: &'a UsartSettings,
}

/// Port running with the settings it was programmed with
#[derive(Debug)]
pub struct Enabled {
    pub settings: UsartSettings,
}

impl<'a, C: SerialControl + ?Sized> Disabled<'a, C> {
    /// Disable the port
    pub fn enter(port: &'a mut C) -> Result<Self, ReconfigError> {
        port.disable()?;
        Ok(Self { port })
    }

    /// Program new settings into the disabled port
    pub fn program(self, settings: &'a UsartSettings) -> Result<Programmed<'a, C>, ReconfigError> {
        self.port.program(settings)?;
        Ok(Programmed {
            port: self.port,
            settings,
        })
    }
}

impl<'a, C: SerialControl + ?Sized> Programmed<'a, C> {
    /// Enable the port with the programmed settings
    pub fn enable(self) -> Result<Enabled, ReconfigError> {
        self.port.enable(self.settings)?;
        Ok(Enabled {
            settings: *self.settings,
        })
    }
}
