//! Scriptable in-memory transport
//!
//! Lets the bridge run without hardware: inbound bytes are fed from a queue,
//! the outbound sink can be told to accept or refuse, and line encoding
//! events queued by the caller are delivered during `service()`.

use crate::transport::{
    ByteSink, ByteSource, LineEncodingCallback, LineEncodingEvents, SendStatus, Transport,
};
use line_coding::LineEncoding;
use std::collections::VecDeque;
use tracing::debug;

/// How the simulated sink answers sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Accept every byte
    Accept,
    /// Refuse with `NotReady`
    NotReady,
    /// Refuse with `Stalled`
    Stalled,
    /// Accept this many more bytes, then refuse with `NotReady`
    AcceptN(usize),
}

/// In-memory transport for simulations and tests
pub struct LoopbackTransport {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    sink: SinkMode,
    ready: bool,
    send_attempts: usize,
    service_calls: usize,
    pending_encodings: VecDeque<LineEncoding>,
    callback: Option<LineEncodingCallback>,
}

impl LoopbackTransport {
    /// Create a transport with an empty source and an accepting sink
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            sink: SinkMode::Accept,
            ready: true,
            send_attempts: 0,
            service_calls: 0,
            pending_encodings: VecDeque::new(),
            callback: None,
        }
    }

    /// Queue bytes on the inbound stream
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Change how the sink answers
    pub fn set_sink(&mut self, mode: SinkMode) {
        self.sink = mode;
    }

    /// Report the sink as busy (`false`) or free for a new transfer
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Queue a host line encoding change, delivered on the next `service()`
    pub fn queue_line_encoding(&mut self, encoding: LineEncoding) {
        self.pending_encodings.push_back(encoding);
    }

    /// Bytes accepted by the sink so far
    pub fn sent(&self) -> &[u8] {
        &self.outbound
    }

    /// Bytes still waiting on the inbound stream
    pub fn remaining_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Number of sends attempted, successful or not
    pub fn send_attempts(&self) -> usize {
        self.send_attempts
    }

    /// Number of housekeeping calls
    pub fn service_calls(&self) -> usize {
        self.service_calls
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for LoopbackTransport {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }
}

impl ByteSink for LoopbackTransport {
    fn try_send_byte(&mut self, byte: u8) -> SendStatus {
        self.send_attempts += 1;
        match self.sink {
            SinkMode::Accept => {
                self.outbound.push(byte);
                SendStatus::Sent
            }
            SinkMode::AcceptN(0) | SinkMode::NotReady => SendStatus::NotReady,
            SinkMode::AcceptN(n) => {
                self.sink = SinkMode::AcceptN(n - 1);
                self.outbound.push(byte);
                SendStatus::Sent
            }
            SinkMode::Stalled => SendStatus::Stalled,
        }
    }

    fn is_ready(&mut self) -> bool {
        self.ready
    }
}

impl Transport for LoopbackTransport {
    fn service(&mut self) {
        self.service_calls += 1;
        while let Some(encoding) = self.pending_encodings.pop_front() {
            match self.callback.as_mut() {
                Some(callback) => callback(encoding),
                None => debug!("Line encoding {} dropped, no handler registered", encoding),
            }
        }
    }
}

impl LineEncodingEvents for LoopbackTransport {
    fn on_line_encoding_changed(&mut self, callback: LineEncodingCallback) {
        self.callback = Some(callback);
    }
}
