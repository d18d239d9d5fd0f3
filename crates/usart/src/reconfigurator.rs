//! Line-Encoding Reconfigurator
//!
//! Handles asynchronous line-encoding notifications from the host. Register
//! values are derived before the port is touched, so a rejected request
//! never disables a running port. The whole disable/program/enable sequence
//! runs while holding the port's control lock.

use crate::control::{Disabled, SerialControl};
use crate::error::ReconfigError;
use crate::settings::{DataBitsPolicy, UsartSettings};
use line_coding::{LineEncoding, DEFAULT_CPU_HZ};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Reconfigurator settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconfigConfig {
    /// CPU clock the baud divisor is computed against
    pub cpu_hz: u32,
    /// Handling of data bit counts outside 6..=8
    pub data_bits_policy: DataBitsPolicy,
}

impl Default for ReconfigConfig {
    fn default() -> Self {
        Self {
            cpu_hz: DEFAULT_CPU_HZ,
            data_bits_policy: DataBitsPolicy::Reject,
        }
    }
}

/// Applies new line encodings to a serial port
pub struct Reconfigurator<C: SerialControl> {
    port: Arc<Mutex<C>>,
    config: ReconfigConfig,
    applied: Option<UsartSettings>,
}

impl<C: SerialControl> Reconfigurator<C> {
    /// Create a reconfigurator owning the port's control state
    pub fn new(port: C, config: ReconfigConfig) -> Self {
        Self::with_shared(Arc::new(Mutex::new(port)), config)
    }

    /// Create a reconfigurator over control state shared with other writers.
    ///
    /// Every writer must hold the same lock while touching control registers.
    pub fn with_shared(port: Arc<Mutex<C>>, config: ReconfigConfig) -> Self {
        Self {
            port,
            config,
            applied: None,
        }
    }

    /// Shared handle to the control state
    pub fn port(&self) -> Arc<Mutex<C>> {
        Arc::clone(&self.port)
    }

    /// Settings currently programmed, if any
    pub fn applied(&self) -> Option<&UsartSettings> {
        self.applied.as_ref()
    }

    /// Reprogram the port for `encoding`
    pub fn apply(&mut self, encoding: &LineEncoding) -> Result<UsartSettings, ReconfigError> {
        let settings =
            UsartSettings::derive(encoding, self.config.cpu_hz, self.config.data_bits_policy)?;

        if self.applied.as_ref() == Some(&settings) {
            debug!("Re-applying unchanged line encoding {}", encoding);
        }

        let mut port = self.port.lock().map_err(|_| ReconfigError::LockPoisoned)?;

        // A failure past this point leaves the port disabled, never half-applied
        self.applied = None;
        let enabled = Disabled::enter(&mut *port)?.program(&settings)?.enable()?;

        info!(
            "Serial port reconfigured: {} (UBRR={}, UCSRC={:#04x})",
            enabled.settings.encoding, enabled.settings.ubrr, enabled.settings.ucsrc
        );
        self.applied = Some(enabled.settings);
        Ok(enabled.settings)
    }

    /// Consume the reconfigurator into a line-encoding notification callback
    pub fn into_handler(mut self) -> impl FnMut(LineEncoding) + Send
    where
        C: Send + 'static,
    {
        move |encoding| {
            if let Err(e) = self.apply(&encoding) {
                warn!("Line encoding {} not applied: {}", encoding, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_file::{PortState, Register, RegisterFile};
    use line_coding::{Parity, StopBits};

    fn reconfigurator() -> Reconfigurator<RegisterFile> {
        Reconfigurator::new(RegisterFile::new(), ReconfigConfig::default())
    }

    #[test]
    fn test_9600_8n1_programs_registers() {
        let mut reconf = reconfigurator();
        let enc = LineEncoding::new(9600, Parity::None, StopBits::One, 8);
        let settings = reconf.apply(&enc).unwrap();

        let port = reconf.port();
        let port = port.lock().unwrap();
        assert_eq!(port.ubrr() as u32, DEFAULT_CPU_HZ / (8 * 9600) - 1);
        assert_eq!(port.ucsrc(), 0b0000_0110);
        assert_eq!(port.ucsra(), 0b0000_0010);
        assert_eq!(port.ucsrb(), 0b1001_1000);
        assert_eq!(reconf.applied(), Some(&settings));
    }

    #[test]
    fn test_sequence_order() {
        let mut reconf = reconfigurator();
        reconf.apply(&LineEncoding::default()).unwrap();

        let port = reconf.port();
        let port = port.lock().unwrap();
        let order: Vec<Register> = port.writes().iter().map(|w| w.register).collect();
        assert_eq!(
            order,
            vec![
                Register::Ucsrb,
                Register::Ucsra,
                Register::Ucsrc,
                Register::Ubrr,
                Register::Ucsrc,
                Register::Ucsra,
                Register::Ucsrb,
            ]
        );
        assert_eq!(port.writes()[0].value, 0);
    }

    #[test]
    fn test_reconfiguration_never_mixes_old_and_new() {
        let mut reconf = reconfigurator();
        let old = reconf
            .apply(&LineEncoding::new(9600, Parity::None, StopBits::One, 8))
            .unwrap();
        let new = reconf
            .apply(&LineEncoding::new(115_200, Parity::Even, StopBits::Two, 7))
            .unwrap();

        let port = reconf.port();
        let port = port.lock().unwrap();
        assert_eq!(
            port.states(),
            &[
                PortState::Disabled,
                PortState::Programmed {
                    ubrr: old.ubrr,
                    ucsrc: old.ucsrc
                },
                PortState::Enabled {
                    ubrr: old.ubrr,
                    ucsrc: old.ucsrc
                },
                PortState::Disabled,
                PortState::Programmed {
                    ubrr: new.ubrr,
                    ucsrc: new.ucsrc
                },
                PortState::Enabled {
                    ubrr: new.ubrr,
                    ucsrc: new.ucsrc
                },
            ]
        );

        // UCSRB stays zero between the disabling write and the final enable
        let second = &port.writes()[7..];
        let (last, middle) = second.split_last().unwrap();
        assert_eq!(last.register, Register::Ucsrb);
        assert!(middle
            .iter()
            .filter(|w| w.register == Register::Ucsrb)
            .all(|w| w.value == 0));
    }

    #[test]
    fn test_rejected_encoding_keeps_port_running() {
        let mut reconf = reconfigurator();
        let good = reconf.apply(&LineEncoding::default()).unwrap();
        let writes_before = reconf.port().lock().unwrap().writes().len();

        let err = reconf
            .apply(&LineEncoding::new(9600, Parity::None, StopBits::One, 9))
            .unwrap_err();
        assert_eq!(err, ReconfigError::UnsupportedDataBits(9));

        let port = reconf.port();
        let port = port.lock().unwrap();
        assert_eq!(port.writes().len(), writes_before);
        assert!(port.is_enabled());
        assert_eq!(reconf.applied(), Some(&good));
    }

    #[test]
    fn test_backend_failure_leaves_port_disabled() {
        let mut reconf = reconfigurator();
        reconf.apply(&LineEncoding::default()).unwrap();
        reconf.port().lock().unwrap().fail_next_program();

        let err = reconf
            .apply(&LineEncoding::new(57_600, Parity::Odd, StopBits::One, 8))
            .unwrap_err();
        assert!(matches!(err, ReconfigError::Backend(_)));

        let port = reconf.port();
        let port = port.lock().unwrap();
        assert_eq!(port.state(), PortState::Disabled);
        assert!(reconf.applied().is_none());
    }

    #[test]
    fn test_handler_applies_and_swallows_errors() {
        let reconf = reconfigurator();
        let port = reconf.port();
        let mut handler = reconf.into_handler();

        handler(LineEncoding::new(0, Parity::None, StopBits::One, 8));
        assert_eq!(port.lock().unwrap().state(), PortState::Disabled);
        assert!(port.lock().unwrap().writes().is_empty());

        handler(LineEncoding::new(19_200, Parity::None, StopBits::One, 8));
        assert!(port.lock().unwrap().is_enabled());
    }

    #[test]
    fn test_clamp_policy_applies() {
        let config = ReconfigConfig {
            data_bits_policy: DataBitsPolicy::ClampToEight,
            ..Default::default()
        };
        let mut reconf = Reconfigurator::new(RegisterFile::new(), config);
        let settings = reconf
            .apply(&LineEncoding::new(9600, Parity::None, StopBits::One, 9))
            .unwrap();
        assert_eq!(settings.encoding.data_bits, 8);
        assert_eq!(settings.ucsrc, 0b0000_0110);
    }
}
