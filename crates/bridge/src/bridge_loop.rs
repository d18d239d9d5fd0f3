//! Bridge Loop Implementation

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::transport::{SendStatus, Transport};
use metrics::{counter, Counter};
use ring_buffer::RingBuffer;
use tracing::{error, info, trace};

/// What the ingress phase did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingress {
    /// One byte read and queued
    Received(u8),
    /// Source had nothing
    NoData,
    /// Buffer full, source not read
    BufferFull,
}

/// Summary of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    pub ingress: Ingress,
    /// Sends attempted in the egress phase
    pub attempted: usize,
    /// Sends that succeeded (and were dequeued)
    pub sent: usize,
    /// Status that cut the egress phase short, if any
    pub refused: Option<SendStatus>,
    /// Egress skipped because the sink was still busy with an earlier transfer
    pub egress_skipped: bool,
}

impl IterationReport {
    /// Whether any byte moved in this iteration
    pub fn is_idle(&self) -> bool {
        !matches!(self.ingress, Ingress::Received(_)) && self.sent == 0
    }
}

/// Cumulative loop statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub iterations: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Egress phases cut short by a refused send
    pub refusals: u64,
    /// Iterations where ingress was skipped for backpressure
    pub full_skips: u64,
    /// Iterations where egress was skipped because the sink was not ready
    pub not_ready_skips: u64,
}

/// Per-lane counter handles, registered once
struct LaneCounters {
    bytes_in: Counter,
    bytes_out: Counter,
    refusals: Counter,
}

impl LaneCounters {
    fn register(lane: &str) -> Self {
        Self {
            bytes_in: counter!("serial_bridge_bytes_in_total", "lane" => lane.to_string()),
            bytes_out: counter!("serial_bridge_bytes_out_total", "lane" => lane.to_string()),
            refusals: counter!("serial_bridge_send_refusals_total", "lane" => lane.to_string()),
        }
    }
}

#[derive(Default)]
struct Egress {
    attempted: usize,
    sent: usize,
    refused: Option<SendStatus>,
    skipped: bool,
}

/// Single cooperative loop moving bytes from a transport's source to its sink
pub struct BridgeLoop<T: Transport> {
    /// Label used in logs and metrics
    name: String,
    buffer: RingBuffer,
    max_chunk: usize,
    transport: T,
    stats: BridgeStats,
    counters: LaneCounters,
}

impl<T: Transport> BridgeLoop<T> {
    /// Create a bridge loop over `transport`
    pub fn new(
        name: impl Into<String>,
        config: BridgeConfig,
        transport: T,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let name = name.into();

        info!(
            "Bridge '{}' created: buffer={} bytes, max_chunk={}",
            name, config.buffer_capacity, config.max_chunk
        );

        Ok(Self {
            counters: LaneCounters::register(&name),
            name,
            buffer: RingBuffer::new(config.buffer_capacity),
            max_chunk: config.max_chunk,
            transport,
            stats: BridgeStats::default(),
        })
    }

    /// Run one iteration: ingress, egress, housekeeping
    pub fn poll_once(&mut self) -> IterationReport {
        let ingress = self.ingress();
        let egress = self.egress();

        // Keeps the transport's endpoint state machines alive; never skipped
        self.transport.service();

        self.stats.iterations += 1;
        IterationReport {
            ingress,
            attempted: egress.attempted,
            sent: egress.sent,
            refused: egress.refused,
            egress_skipped: egress.skipped,
        }
    }

    /// Run `iterations` iterations and return the cumulative statistics
    pub fn run_for(&mut self, iterations: usize) -> BridgeStats {
        for _ in 0..iterations {
            self.poll_once();
        }
        self.stats
    }

    /// Run forever without any internal delay
    pub fn run_forever(&mut self) -> ! {
        info!("Bridge '{}' running", self.name);
        loop {
            self.poll_once();
        }
    }

    /// Pull at most one byte from the source, unless the buffer is full
    fn ingress(&mut self) -> Ingress {
        if self.buffer.is_full() {
            self.stats.full_skips += 1;
            return Ingress::BufferFull;
        }

        let Some(byte) = self.transport.try_read_byte() else {
            return Ingress::NoData;
        };

        match self.buffer.insert(byte) {
            Ok(()) => {
                self.stats.bytes_in += 1;
                self.counters.bytes_in.increment(1);
                Ingress::Received(byte)
            }
            // Unreachable while fullness is checked above
            Err(e) => {
                error!("Bridge '{}' dropped byte {:#04x}: {}", self.name, byte, e);
                Ingress::BufferFull
            }
        }
    }

    /// Send up to `max_chunk - 1` bytes, dequeuing each only once accepted.
    ///
    /// A full `max_chunk` transfer would need a zero-length terminator that
    /// can block while the peer isn't reading, so the chunk stays one short.
    /// Nothing is attempted while the sink still holds an earlier transfer.
    fn egress(&mut self) -> Egress {
        let mut result = Egress::default();
        let to_send = self.buffer.len().min(self.max_chunk - 1);
        if to_send == 0 {
            return result;
        }

        if !self.transport.is_ready() {
            trace!(
                "Bridge '{}' sink busy, {} bytes held",
                self.name,
                self.buffer.len()
            );
            self.stats.not_ready_skips += 1;
            result.skipped = true;
            return result;
        }

        for _ in 0..to_send {
            let Some(byte) = self.buffer.peek() else {
                break;
            };

            result.attempted += 1;
            match self.transport.try_send_byte(byte) {
                SendStatus::Sent => {
                    self.buffer.remove();
                    result.sent += 1;
                }
                status => {
                    // Head byte stays queued and is retried next iteration
                    trace!(
                        "Bridge '{}' send refused ({:?}), {} bytes queued",
                        self.name,
                        status,
                        self.buffer.len()
                    );
                    result.refused = Some(status);
                    break;
                }
            }
        }

        self.stats.bytes_out += result.sent as u64;
        if result.sent > 0 {
            self.counters.bytes_out.increment(result.sent as u64);
        }
        if result.refused.is_some() {
            self.stats.refusals += 1;
            self.counters.refusals.increment(1);
        }

        result
    }

    /// Loop label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queued bytes
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Cumulative statistics
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackTransport, SinkMode};
    use crate::transport::LineEncodingEvents;
    use line_coding::{LineEncoding, Parity, StopBits, DEFAULT_CPU_HZ};
    use proptest::prelude::*;
    use usart::{PortState, ReconfigConfig, Reconfigurator, RegisterFile};

    fn bridge(capacity: usize, max_chunk: usize) -> BridgeLoop<LoopbackTransport> {
        let config = BridgeConfig {
            buffer_capacity: capacity,
            max_chunk,
        };
        BridgeLoop::new("test", config, LoopbackTransport::new()).unwrap()
    }

    #[test]
    fn test_one_byte_ingress_per_iteration() {
        let mut bridge = bridge(16, 8);
        bridge.transport_mut().set_sink(SinkMode::NotReady);
        bridge.transport_mut().feed(&[1, 2, 3]);

        let report = bridge.poll_once();
        assert_eq!(report.ingress, Ingress::Received(1));
        assert_eq!(bridge.buffer().len(), 1);
        assert_eq!(bridge.transport().remaining_inbound(), 2);
    }

    #[test]
    fn test_no_data_is_not_an_error() {
        let mut bridge = bridge(16, 8);
        let report = bridge.poll_once();
        assert_eq!(report.ingress, Ingress::NoData);
        assert_eq!(report.attempted, 0);
        assert!(report.is_idle());
    }

    #[test]
    fn test_housekeeping_every_iteration() {
        let mut bridge = bridge(4, 8);
        bridge.transport_mut().set_sink(SinkMode::Stalled);
        bridge.transport_mut().feed(&[0; 10]);

        bridge.run_for(25);
        assert_eq!(bridge.transport().service_calls(), 25);
        assert_eq!(bridge.stats().iterations, 25);
    }

    #[test]
    fn test_chunk_cap_is_one_short_of_max() {
        let mut bridge = bridge(128, 64);
        bridge.transport_mut().set_sink(SinkMode::NotReady);
        bridge.transport_mut().feed(&(0..100).collect::<Vec<u8>>());
        bridge.run_for(100);
        assert_eq!(bridge.buffer().len(), 100);

        bridge.transport_mut().set_sink(SinkMode::Accept);
        let attempts_before = bridge.transport().send_attempts();
        let report = bridge.poll_once();

        assert_eq!(report.attempted, 63);
        assert_eq!(report.sent, 63);
        assert_eq!(bridge.transport().send_attempts() - attempts_before, 63);
        assert_eq!(bridge.buffer().len(), 37);
    }

    #[test]
    fn test_refused_send_keeps_byte_queued() {
        let mut bridge = bridge(16, 8);
        bridge.transport_mut().set_sink(SinkMode::NotReady);
        bridge.transport_mut().feed(&[0xAA]);
        let report = bridge.poll_once();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.refused, Some(SendStatus::NotReady));
        assert_eq!(bridge.buffer().len(), 1);
        assert_eq!(bridge.buffer().peek(), Some(0xAA));

        bridge.transport_mut().set_sink(SinkMode::Accept);
        let report = bridge.poll_once();
        assert_eq!(report.sent, 1);
        assert!(bridge.buffer().is_empty());
        assert_eq!(bridge.transport().sent(), &[0xAA]);
    }

    #[test]
    fn test_partial_chunk_stops_at_first_failure() {
        let mut bridge = bridge(16, 16);
        bridge.transport_mut().set_sink(SinkMode::NotReady);
        bridge.transport_mut().feed(&[10, 11, 12, 13, 14]);
        bridge.run_for(5);

        bridge.transport_mut().set_sink(SinkMode::AcceptN(2));
        let report = bridge.poll_once();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(bridge.buffer().peek(), Some(12));
        assert_eq!(bridge.buffer().len(), 3);

        bridge.transport_mut().set_sink(SinkMode::Accept);
        bridge.poll_once();
        assert_eq!(bridge.transport().sent(), &[10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_busy_sink_skips_egress() {
        let mut bridge = bridge(16, 8);
        bridge.transport_mut().feed(&[1, 2, 3]);
        bridge.transport_mut().set_ready(false);

        for _ in 0..3 {
            let report = bridge.poll_once();
            assert!(report.egress_skipped);
            assert_eq!(report.attempted, 0);
            assert_eq!(report.refused, None);
        }
        assert_eq!(bridge.transport().send_attempts(), 0);
        assert_eq!(bridge.buffer().len(), 3);
        assert_eq!(bridge.stats().not_ready_skips, 3);
        // Housekeeping still runs while egress is held
        assert_eq!(bridge.transport().service_calls(), 3);

        bridge.transport_mut().set_ready(true);
        let report = bridge.poll_once();
        assert!(!report.egress_skipped);
        assert_eq!(report.sent, 3);
        assert_eq!(bridge.transport().sent(), &[1, 2, 3]);
    }

    #[test]
    fn test_empty_buffer_does_not_query_readiness() {
        let mut bridge = bridge(16, 8);
        bridge.transport_mut().set_ready(false);
        let report = bridge.poll_once();
        assert!(!report.egress_skipped);
        assert_eq!(bridge.stats().not_ready_skips, 0);
    }

    #[test]
    fn test_backpressure_then_drain() {
        let mut bridge = bridge(128, 8);
        bridge.transport_mut().set_sink(SinkMode::NotReady);
        let input: Vec<u8> = (0..150u32).map(|i| i as u8).collect();
        bridge.transport_mut().feed(&input);

        bridge.run_for(128);
        assert!(bridge.buffer().is_full());
        assert_eq!(bridge.transport().remaining_inbound(), 22);

        // Ingress stays skipped while full
        for _ in 0..10 {
            let report = bridge.poll_once();
            assert_eq!(report.ingress, Ingress::BufferFull);
        }
        assert_eq!(bridge.transport().remaining_inbound(), 22);

        bridge.transport_mut().set_sink(SinkMode::Accept);
        let first = bridge.poll_once();
        assert_eq!(first.sent, 7);

        while !(bridge.buffer().is_empty() && bridge.transport().remaining_inbound() == 0) {
            let queued_before = bridge.buffer().len();
            let report = bridge.poll_once();
            let received = matches!(report.ingress, Ingress::Received(_));
            let available = queued_before + usize::from(received);
            assert_eq!(report.sent, available.min(7));
        }

        assert_eq!(bridge.transport().sent(), input.as_slice());
        assert_eq!(bridge.stats().bytes_in, 150);
        assert_eq!(bridge.stats().bytes_out, 150);
    }

    #[test]
    fn test_reconfiguration_during_housekeeping() {
        let reconf = Reconfigurator::new(RegisterFile::new(), ReconfigConfig::default());
        let port = reconf.port();

        let mut bridge = bridge(16, 8);
        bridge
            .transport_mut()
            .on_line_encoding_changed(Box::new(reconf.into_handler()));
        bridge.transport_mut().feed(b"hi");
        bridge
            .transport_mut()
            .queue_line_encoding(LineEncoding::new(9600, Parity::None, StopBits::One, 8));

        bridge.run_for(3);

        assert_eq!(bridge.transport().sent(), b"hi");
        let port = port.lock().unwrap();
        assert_eq!(
            port.state(),
            PortState::Enabled {
                ubrr: (DEFAULT_CPU_HZ / (8 * 9600) - 1) as u16,
                ucsrc: 0b0000_0110,
            }
        );
        assert_eq!(port.states().len(), 3);
    }

    proptest! {
        #[test]
        fn prop_flaky_sink_never_loses_or_duplicates(
            input in proptest::collection::vec(any::<u8>(), 0..300),
            accepts in proptest::collection::vec(1usize..10, 1..64),
            capacity in 1usize..64,
            max_chunk in 2usize..32,
        ) {
            let mut bridge = bridge(capacity, max_chunk);
            bridge.transport_mut().feed(&input);

            let mut i = 0;
            while bridge.transport().sent().len() < input.len() {
                bridge.transport_mut().set_sink(SinkMode::AcceptN(accepts[i % accepts.len()]));
                let report = bridge.poll_once();
                prop_assert!(report.attempted < max_chunk);
                prop_assert!(bridge.buffer().len() <= capacity);
                i += 1;
                prop_assert!(i < 100_000);
            }

            prop_assert_eq!(bridge.transport().sent(), input.as_slice());
        }
    }
}
