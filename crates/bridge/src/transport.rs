//! Transport Interfaces
//!
//! The non-blocking byte-stream operations the bridge loop consumes from the
//! host-side transport.

use line_coding::LineEncoding;

/// Outcome of a non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Byte accepted
    Sent,
    /// Sink busy; try again later
    NotReady,
    /// Endpoint stalled or peer gone; try again later
    Stalled,
}

impl SendStatus {
    pub fn is_sent(self) -> bool {
        self == SendStatus::Sent
    }
}

/// Non-blocking inbound byte stream
pub trait ByteSource {
    /// Read one byte, or `None` if nothing is available right now
    fn try_read_byte(&mut self) -> Option<u8>;
}

/// Non-blocking outbound byte stream
pub trait ByteSink {
    /// Offer one byte to the sink
    fn try_send_byte(&mut self, byte: u8) -> SendStatus;

    /// Whether the sink can take a new transfer right now, without blocking.
    ///
    /// Returns `false` while an earlier transfer is still waiting for the
    /// peer; the bridge then skips its whole egress phase for the iteration.
    fn is_ready(&mut self) -> bool {
        true
    }
}

/// Full transport: both streams plus periodic housekeeping
pub trait Transport: ByteSource + ByteSink {
    /// Periodic maintenance for the inbound and outbound endpoints.
    ///
    /// Called once per bridge iteration whether or not any bytes moved.
    /// Asynchronous host events (line encoding changes) may be delivered
    /// from inside this call.
    fn service(&mut self);
}

/// Callback receiving new line encodings from the host
pub type LineEncodingCallback = Box<dyn FnMut(LineEncoding) + Send>;

/// Registration point for line encoding change notifications
pub trait LineEncodingEvents {
    /// Register the callback, replacing any previous one
    fn on_line_encoding_changed(&mut self, callback: LineEncodingCallback);
}
