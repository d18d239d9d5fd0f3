//! Daemon configuration
//!
//! Layered from an optional TOML file and `SERIAL_BRIDGE__*` environment
//! variables, e.g. `SERIAL_BRIDGE__DEVICE__PATH=/dev/ttyACM0`.

use crate::error::DaemonError;
use bridge::BridgeConfig;
use ::config::{Config, Environment, File, FileFormat};
use line_coding::LineEncoding;
use serde::{Deserialize, Serialize};
use tracing::Level;
use usart::{ReconfigConfig, UsartSettings};

/// Default configuration file name (any supported extension)
pub const DEFAULT_CONFIG_NAME: &str = "serial-bridge";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SERIAL_BRIDGE";

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub device: DeviceConfig,
    /// Applied to both lanes
    pub bridge: BridgeConfig,
    pub reconfig: ReconfigConfig,
    pub logging: LoggingConfig,
    pub runtime: RuntimeConfig,
}

/// Hardware serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device path (e.g. "/dev/ttyUSB0")
    pub path: String,
    /// Framing used until the host asks for something else
    pub encoding: LineEncoding,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            encoding: LineEncoding::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn, error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl LoggingConfig {
    /// Parsed maximum level
    pub fn max_level(&self) -> Result<Level, DaemonError> {
        self.level
            .parse::<Level>()
            .map_err(|_| DaemonError::InvalidLogLevel(self.level.clone()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Driver loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Sleep after a round where nothing moved (microseconds, 0 = only yield)
    pub idle_sleep_us: u64,
    /// Check the PTY line settings on every this many housekeeping calls
    pub encoding_poll_interval: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            idle_sleep_us: 0,
            encoding_poll_interval: 64,
        }
    }
}

impl DaemonConfig {
    /// Load from `path` (or the default file name if present) plus environment
    pub fn load(path: Option<&str>) -> Result<Self, DaemonError> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse a TOML document, without environment overrides
    pub fn from_toml(document: &str) -> Result<Self, DaemonError> {
        let config = Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the parts that can be checked before opening anything
    pub fn validate(&self) -> Result<(), DaemonError> {
        self.bridge.validate()?;
        self.logging.max_level()?;
        self.initial_settings()?;
        Ok(())
    }

    /// Register settings for the startup encoding under the configured policy
    pub fn initial_settings(&self) -> Result<UsartSettings, DaemonError> {
        Ok(UsartSettings::derive(
            &self.device.encoding,
            self.reconfig.cpu_hz,
            self.reconfig.data_bits_policy,
        )?)
    }
}
