//! Byte-Stream Bridge
//!
//! Moves bytes from an inbound stream to an outbound stream through a
//! bounded [`RingBuffer`], one cooperative iteration at a time. Nothing in
//! an iteration blocks: "no data" and "sink not ready" are ordinary outcomes
//! retried on the next pass.

mod bridge_loop;
mod config;
mod error;
pub mod loopback;
mod transport;

pub use bridge_loop::{BridgeLoop, BridgeStats, Ingress, IterationReport};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use transport::{
    ByteSink, ByteSource, LineEncodingCallback, LineEncodingEvents, SendStatus, Transport,
};

pub use line_coding::LineEncoding;
pub use ring_buffer::RingBuffer;
