//! Serial Bridge Daemon
//!
//! Bridges a PTY (the host-facing virtual serial channel) to a hardware
//! serial port. Host programs open the PTY slave; line settings they apply
//! there are mirrored onto the hardware port.

mod config;
mod device;
mod error;
mod lanes;
mod pty;

pub use config::{DaemonConfig, DeviceConfig, LoggingConfig, RuntimeConfig};
pub use device::{DeviceControl, DeviceData};
pub use error::DaemonError;
pub use lanes::{DeviceToHost, HostToDevice};
pub use pty::PtyChannel;

use bridge::{BridgeLoop, BridgeStats, LineEncodingEvents};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use usart::Reconfigurator;

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = config.max_level()?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Both bridge lanes plus the device reconfiguration path
pub struct SerialBridge {
    upstream: BridgeLoop<HostToDevice>,
    downstream: BridgeLoop<DeviceToHost>,
}

impl SerialBridge {
    /// Allocate the PTY, open the device and wire the lanes together
    pub fn open(config: &DaemonConfig) -> Result<Self, DaemonError> {
        config.validate()?;

        // Framing actually programmed, after the data bits policy
        let initial = config.initial_settings()?.encoding;
        let host = PtyChannel::open(&initial)?;
        let port = device::open(&config.device.path, &initial)?;

        let control = DeviceControl::new(port.try_clone()?);
        let mut reconfigurator = Reconfigurator::new(control, config.reconfig);
        reconfigurator.apply(&initial)?;

        let mut upstream_transport = HostToDevice::new(
            host.try_clone()?,
            DeviceData::new(port.try_clone()?),
            initial,
            config.runtime.encoding_poll_interval,
        );
        upstream_transport.on_line_encoding_changed(Box::new(reconfigurator.into_handler()));

        let downstream_transport = DeviceToHost::new(DeviceData::new(port), host);

        Ok(Self {
            upstream: BridgeLoop::new("host-to-device", config.bridge, upstream_transport)?,
            downstream: BridgeLoop::new("device-to-host", config.bridge, downstream_transport)?,
        })
    }

    /// Path of the PTY slave host programs should open
    pub fn host_path(&self) -> &Path {
        self.downstream.transport().host_path()
    }

    /// One iteration of each lane; `true` if nothing moved
    pub fn poll_once(&mut self) -> bool {
        let up = self.upstream.poll_once();
        let down = self.downstream.poll_once();
        up.is_idle() && down.is_idle()
    }

    /// Statistics for (host-to-device, device-to-host)
    pub fn stats(&self) -> (BridgeStats, BridgeStats) {
        (self.upstream.stats(), self.downstream.stats())
    }
}

/// Run the bridge until ctrl-c
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    run_until(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Run the bridge until `shutdown` completes
pub async fn run_until<F>(config: DaemonConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut bridge = SerialBridge::open(&config)?;
    info!(
        "Bridging {} <-> {}",
        bridge.host_path().display(),
        config.device.path
    );

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        shutdown.await;
        info!("Shutdown requested");
        flag.store(true, Ordering::Relaxed);
    });

    let idle_sleep = Duration::from_micros(config.runtime.idle_sleep_us);
    while !stop.load(Ordering::Relaxed) {
        let idle = bridge.poll_once();
        if idle && !idle_sleep.is_zero() {
            tokio::time::sleep(idle_sleep).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    let (up, down) = bridge.stats();
    info!(
        "Bridge stopped: host->device {} bytes, device->host {} bytes",
        up.bytes_out, down.bytes_out
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use line_coding::{LineEncoding, Parity, StopBits};
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Write};
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use usart::{DataBitsPolicy, ReconfigError};

    fn open_slave(path: &Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .unwrap()
    }

    /// Bridge against a second PTY standing in for the hardware port
    fn bridge_with_fake_device() -> (SerialBridge, PtyChannel) {
        let device_side = PtyChannel::open(&LineEncoding::default()).unwrap();

        let mut config = DaemonConfig::default();
        config.device.path = device_side.slave_path().to_string_lossy().into_owned();
        config.runtime.encoding_poll_interval = 1;

        (SerialBridge::open(&config).unwrap(), device_side)
    }

    #[test]
    fn test_bytes_flow_both_ways() {
        let (mut bridge, mut device_side) = bridge_with_fake_device();
        let mut host = open_slave(bridge.host_path());

        host.write_all(b"ping").unwrap();
        let mut at_device = Vec::new();
        for _ in 0..5000 {
            bridge.poll_once();
            if let Some(b) = device_side.try_read_byte() {
                at_device.push(b);
            }
            if at_device.len() == 4 {
                break;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
        assert_eq!(at_device, b"ping");

        for &b in b"pong" {
            assert!(device_side.try_write_byte(b).unwrap());
        }
        let mut at_host = Vec::new();
        let mut buf = [0u8; 16];
        for _ in 0..5000 {
            bridge.poll_once();
            if let Ok(n) = host.read(&mut buf) {
                at_host.extend_from_slice(&buf[..n]);
            }
            if at_host.len() >= 4 {
                break;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
        assert_eq!(at_host, b"pong");
    }

    #[test]
    fn test_host_line_change_reconfigures_device() {
        let (mut bridge, device_side) = bridge_with_fake_device();
        let host = open_slave(bridge.host_path());

        let requested = LineEncoding::new(115_200, Parity::Even, StopBits::Two, 7);
        let mut termios = pty::get_termios(host.as_raw_fd()).unwrap();
        pty::apply_encoding(&mut termios, &requested).unwrap();
        pty::set_termios(host.as_raw_fd(), &termios).unwrap();

        bridge.poll_once();
        assert_eq!(device_side.line_encoding().unwrap(), Some(requested));
    }

    #[test]
    fn test_unsupported_data_bits_leave_device_alone() {
        let (mut bridge, device_side) = bridge_with_fake_device();
        let host = open_slave(bridge.host_path());

        let requested = LineEncoding::new(19_200, Parity::None, StopBits::One, 5);
        let mut termios = pty::get_termios(host.as_raw_fd()).unwrap();
        pty::apply_encoding(&mut termios, &requested).unwrap();
        pty::set_termios(host.as_raw_fd(), &termios).unwrap();

        bridge.poll_once();
        assert_eq!(
            device_side.line_encoding().unwrap(),
            Some(LineEncoding::default())
        );
    }

    #[test]
    fn test_initial_encoding_follows_data_bits_policy() {
        let device_side = PtyChannel::open(&LineEncoding::default()).unwrap();
        let mut config = DaemonConfig::default();
        config.device.path = device_side.slave_path().to_string_lossy().into_owned();
        config.device.encoding = LineEncoding::new(19_200, Parity::None, StopBits::One, 9);

        assert!(matches!(
            SerialBridge::open(&config),
            Err(DaemonError::Reconfig(ReconfigError::UnsupportedDataBits(9)))
        ));

        config.reconfig.data_bits_policy = DataBitsPolicy::ClampToEight;
        let bridge = SerialBridge::open(&config).unwrap();
        let host = open_slave(bridge.host_path());
        let clamped = LineEncoding::new(19_200, Parity::None, StopBits::One, 8);
        assert_eq!(device_side.line_encoding().unwrap(), Some(clamped));
        let host_termios = pty::get_termios(host.as_raw_fd()).unwrap();
        assert_eq!(pty::termios_to_encoding(&host_termios), Some(clamped));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let device_side = PtyChannel::open(&LineEncoding::default()).unwrap();
        let mut config = DaemonConfig::default();
        config.device.path = device_side.slave_path().to_string_lossy().into_owned();
        config.runtime.idle_sleep_us = 100;

        let shutdown = tokio::time::sleep(Duration::from_millis(20));
        run_until(config, shutdown).await.unwrap();
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let mut config = DaemonConfig::default();
        config.device.path = "/dev/does-not-exist-serial-bridge".to_string();
        assert!(matches!(
            SerialBridge::open(&config),
            Err(DaemonError::Serial(_))
        ));
    }
}
