//! Lane Transports
//!
//! Each direction of the bridge is its own [`BridgeLoop`](bridge::BridgeLoop)
//! with its own buffer. The host-to-device lane also watches the PTY for line
//! setting changes during housekeeping and reports them to the registered
//! callback.

use crate::device::DeviceData;
use crate::pty::PtyChannel;
use bridge::{
    ByteSink, ByteSource, LineEncodingCallback, LineEncodingEvents, SendStatus, Transport,
};
use line_coding::LineEncoding;
use std::path::Path;
use tracing::{debug, info, warn};

/// PTY master -> device port
pub struct HostToDevice {
    host: PtyChannel,
    device: DeviceData,
    last_encoding: Option<LineEncoding>,
    poll_interval: u32,
    ticks: u32,
    callback: Option<LineEncodingCallback>,
}

impl HostToDevice {
    /// `current` is the encoding already applied to the device
    pub fn new(
        host: PtyChannel,
        device: DeviceData,
        current: LineEncoding,
        poll_interval: u32,
    ) -> Self {
        Self {
            host,
            device,
            last_encoding: Some(current),
            poll_interval: poll_interval.max(1),
            ticks: 0,
            callback: None,
        }
    }

    fn poll_line_encoding(&mut self) {
        let encoding = match self.host.line_encoding() {
            Ok(Some(encoding)) => encoding,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not read PTY line settings: {}", e);
                return;
            }
        };

        if self.last_encoding == Some(encoding) {
            return;
        }

        info!("Host changed line encoding to {}", encoding);
        self.last_encoding = Some(encoding);
        if let Some(callback) = self.callback.as_mut() {
            callback(encoding);
        }
    }
}

impl ByteSource for HostToDevice {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.host.try_read_byte()
    }
}

impl ByteSink for HostToDevice {
    fn try_send_byte(&mut self, byte: u8) -> SendStatus {
        match self.device.try_write_byte(byte) {
            Ok(true) => SendStatus::Sent,
            Ok(false) => SendStatus::NotReady,
            Err(e) => {
                debug!("Device write failed: {}", e);
                SendStatus::Stalled
            }
        }
    }
}

impl Transport for HostToDevice {
    fn service(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % self.poll_interval == 0 {
            self.poll_line_encoding();
        }
    }
}

impl LineEncodingEvents for HostToDevice {
    fn on_line_encoding_changed(&mut self, callback: LineEncodingCallback) {
        self.callback = Some(callback);
    }
}

/// Device port -> PTY master
pub struct DeviceToHost {
    device: DeviceData,
    host: PtyChannel,
}

impl DeviceToHost {
    pub fn new(device: DeviceData, host: PtyChannel) -> Self {
        Self { device, host }
    }

    /// PTY slave path
    pub fn host_path(&self) -> &Path {
        self.host.slave_path()
    }
}

impl ByteSource for DeviceToHost {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.device.try_read_byte()
    }
}

impl ByteSink for DeviceToHost {
    fn try_send_byte(&mut self, byte: u8) -> SendStatus {
        match self.host.try_write_byte(byte) {
            Ok(true) => SendStatus::Sent,
            Ok(false) => SendStatus::NotReady,
            Err(e) => {
                debug!("PTY write failed: {}", e);
                SendStatus::Stalled
            }
        }
    }

    fn is_ready(&mut self) -> bool {
        self.host.is_writable()
    }
}

impl Transport for DeviceToHost {
    fn service(&mut self) {
        // Both endpoints are kernel-managed; nothing to pump here
    }
}
