//! USART Control and Line-Encoding Reconfiguration
//!
//! Translates a host-requested [`LineEncoding`] into USART register state and
//! applies it as a strict `Disabled -> Programmed -> Enabled` sequence, so the
//! hardware never runs with a half-applied configuration.

mod control;
mod error;
mod reconfigurator;
mod register_file;
mod settings;

pub use control::{Disabled, Enabled, Programmed, SerialControl};
pub use error::ReconfigError;
pub use reconfigurator::{ReconfigConfig, Reconfigurator};
pub use register_file::{PortState, Register, RegisterFile, RegisterWrite};
pub use settings::{DataBitsPolicy, UsartSettings};

pub use line_coding::LineEncoding;
