//! In-Memory USART Register File
//!
//! Models UCSRnA/B/C and UBRRn, recording every write and every state the
//! port passes through. Used wherever real registers are unavailable.

use crate::control::SerialControl;
use crate::error::ReconfigError;
use crate::settings::UsartSettings;
use line_coding::regs::{bit, ucsrb};

/// USART register identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Ucsra,
    Ucsrb,
    Ucsrc,
    Ubrr,
}

/// One register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub register: Register,
    pub value: u16,
}

/// Observable state of the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Everything off
    Disabled,
    /// Divisor and mode written, transmitter/receiver still off
    Programmed { ubrr: u16, ucsrc: u8 },
    /// Running
    Enabled { ubrr: u16, ucsrc: u8 },
}

/// Simulated USART register file
///
/// Programming always sets the double-speed bit in UCSRnA, so a port with
/// UCSRnA and UCSRnC both clear is treated as disabled whatever UBRRn holds.
#[derive(Debug, Default)]
pub struct RegisterFile {
    ucsra: u8,
    ucsrb: u8,
    ucsrc: u8,
    ubrr: u16,
    writes: Vec<RegisterWrite>,
    states: Vec<PortState>,
    /// Fail the next `program` call (fault injection)
    fail_next_program: bool,
}

impl RegisterFile {
    /// Create a register file in reset state (all zero, disabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state derived from the registers
    pub fn state(&self) -> PortState {
        let running = bit(ucsrb::TXEN) | bit(ucsrb::RXEN);
        if self.ucsrb & running != 0 {
            PortState::Enabled {
                ubrr: self.ubrr,
                ucsrc: self.ucsrc,
            }
        } else if self.ucsra == 0 && self.ucsrc == 0 {
            PortState::Disabled
        } else {
            PortState::Programmed {
                ubrr: self.ubrr,
                ucsrc: self.ucsrc,
            }
        }
    }

    /// Whether the transmitter or receiver is on
    pub fn is_enabled(&self) -> bool {
        matches!(self.state(), PortState::Enabled { .. })
    }

    pub fn ucsra(&self) -> u8 {
        self.ucsra
    }

    pub fn ucsrb(&self) -> u8 {
        self.ucsrb
    }

    pub fn ucsrc(&self) -> u8 {
        self.ucsrc
    }

    pub fn ubrr(&self) -> u16 {
        self.ubrr
    }

    /// Every register write in order
    pub fn writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    /// State after each control step
    pub fn states(&self) -> &[PortState] {
        &self.states
    }

    /// Make the next `program` call fail
    pub fn fail_next_program(&mut self) {
        self.fail_next_program = true;
    }

    fn write(&mut self, register: Register, value: u16) {
        match register {
            Register::Ucsra => self.ucsra = value as u8,
            Register::Ucsrb => self.ucsrb = value as u8,
            Register::Ucsrc => self.ucsrc = value as u8,
            Register::Ubrr => self.ubrr = value,
        }
        self.writes.push(RegisterWrite { register, value });
    }

    fn record_state(&mut self) {
        let state = self.state();
        self.states.push(state);
    }
}

impl SerialControl for RegisterFile {
    fn disable(&mut self) -> Result<(), ReconfigError> {
        self.write(Register::Ucsrb, 0);
        self.write(Register::Ucsra, 0);
        self.write(Register::Ucsrc, 0);
        self.record_state();
        Ok(())
    }

    fn program(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError> {
        if std::mem::take(&mut self.fail_next_program) {
            return Err(ReconfigError::Backend("injected program failure".into()));
        }

        self.write(Register::Ubrr, settings.ubrr);
        self.write(Register::Ucsrc, u16::from(settings.ucsrc));
        self.write(Register::Ucsra, u16::from(settings.ucsra));
        self.record_state();
        Ok(())
    }

    fn enable(&mut self, settings: &UsartSettings) -> Result<(), ReconfigError> {
        self.write(Register::Ucsrb, u16::from(settings.ucsrb));
        self.record_state();
        Ok(())
    }
}
