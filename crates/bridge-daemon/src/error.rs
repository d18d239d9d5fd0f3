//! Daemon Error Types

use thiserror::Error;

/// Errors setting up or running the bridge daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    /// PTY allocation or termios access failed
    #[error("PTY error: {0}")]
    Pty(#[source] std::io::Error),

    /// Device serial port could not be opened or cloned
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Baud rate has no termios speed constant
    #[error("Baud rate {0} not supported by the PTY")]
    UnsupportedBaud(u32),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Bridge loop rejected its configuration
    #[error(transparent)]
    Bridge(#[from] bridge::BridgeError),

    /// Device line encoding rejected or could not be applied
    #[error("Device line encoding error: {0}")]
    Reconfig(#[from] usart::ReconfigError),

    /// Logging level not one of trace, debug, info, warn, error
    #[error("Invalid log level '{0}'")]
    InvalidLogLevel(String),
}
