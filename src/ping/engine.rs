use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::PingError;
use crate::ping::clock::{Clock, SystemClock};
use crate::probe::{
    ICMP_HEADER_SIZE, IcmpKind, RECV_BUFFER_SIZE, Transport, decode, encode, get_identifier,
    resolve_ipv4,
};
use crate::state::{ProbeRecord, SessionStats};

/// How long a single poll waits for any datagram
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Granularity of the cancellable inter-cycle sleep
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Progress reported to the caller while a run is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum PingEvent {
    /// Destination resolved, first request about to go out
    Started {
        destination: String,
        address: Ipv4Addr,
        header_len: usize,
        payload_len: usize,
    },
    /// A cycle got its reply
    Reply {
        sequence: u16,
        bytes: usize,
        from: IpAddr,
        rtt_ms: f64,
    },
    /// A cycle was abandoned without a reply
    Timeout { sequence: u16 },
}

/// A datagram accepted as the answer to the current cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedReply {
    /// Sequence number carried by the reply
    pub sequence: u16,
    /// Datagram size including the IPv4 header
    pub bytes: usize,
    pub from: IpAddr,
    pub received_at: Instant,
}

/// How the wait for a reply ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Matched(MatchedReply),
    TimedOut,
    Cancelled,
}

/// Sends one echo request at a time and waits for its reply
///
/// A fresh engine is built per run. It owns the transport, so the socket is
/// released when the run ends, whatever the outcome.
pub struct PingEngine<T: Transport, C: Clock = SystemClock> {
    config: Config,
    transport: T,
    clock: C,
    identifier: u16,
    sequence: u16,
    stats: SessionStats,
    cancel: CancellationToken,
    buffer: Vec<u8>,
}

impl<T: Transport> PingEngine<T, SystemClock> {
    pub fn new(config: Config, transport: T, cancel: CancellationToken) -> Self {
        Self {
            config,
            transport,
            clock: SystemClock,
            identifier: get_identifier(),
            sequence: 0,
            stats: SessionStats::new(),
            cancel,
            buffer: vec![0u8; RECV_BUFFER_SIZE],
        }
    }
}

impl<T: Transport, C: Clock> PingEngine<T, C> {
    /// Replace the time source
    pub fn with_clock<C2: Clock>(self, clock: C2) -> PingEngine<T, C2> {
        PingEngine {
            config: self.config,
            transport: self.transport,
            clock,
            identifier: self.identifier,
            sequence: self.sequence,
            stats: self.stats,
            cancel: self.cancel,
            buffer: self.buffer,
        }
    }

    /// Override the ICMP identifier (defaults to the process id)
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    /// Run all cycles and return the collected statistics
    ///
    /// `on_event` sees every cycle outcome as it happens. Resolution and
    /// socket failures abort the run; timeouts and unrelated datagrams do not.
    pub fn run<F>(mut self, mut on_event: F) -> Result<SessionStats, PingError>
    where
        F: FnMut(&PingEvent),
    {
        let address = resolve_ipv4(&self.config.destination)?;
        log::info!(
            "Pinging {} ({}) with identifier {}",
            self.config.destination,
            address,
            self.identifier
        );

        on_event(&PingEvent::Started {
            destination: self.config.destination.clone(),
            address,
            header_len: ICMP_HEADER_SIZE,
            payload_len: self.config.payload.len(),
        });

        while !self.cancel.is_cancelled() && !self.limit_reached() {
            self.sequence = self.sequence.wrapping_add(1);
            let sequence = self.sequence;

            let packet = encode(self.identifier, sequence, &self.config.payload);
            let mut record = ProbeRecord::new(sequence, self.clock.now());
            self.transport.send_to(&packet.bytes, address)?;
            self.stats.record_sent();

            match self.wait_for_reply(&record)? {
                WaitOutcome::Matched(reply) => {
                    let rtt_ms = record.complete(reply.received_at);
                    self.stats.record_reply(rtt_ms);
                    on_event(&PingEvent::Reply {
                        sequence: reply.sequence,
                        bytes: reply.bytes,
                        from: reply.from,
                        rtt_ms,
                    });

                    if !self.limit_reached() {
                        self.pause(self.config.interval);
                    }
                }
                WaitOutcome::TimedOut => {
                    log::info!("{}", PingError::CycleTimeout { sequence });
                    on_event(&PingEvent::Timeout { sequence });
                }
                WaitOutcome::Cancelled => break,
            }
        }

        log::debug!(
            "Run finished: {} transmitted, {} received",
            self.stats.transmitted,
            self.stats.received
        );
        Ok(self.stats)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .count
            .is_some_and(|count| self.stats.transmitted >= count)
    }

    /// Poll until a reply for this run arrives, a poll window stays empty,
    /// or the run is cancelled
    ///
    /// Every poll gets a fresh window, so without a cycle deadline a steady
    /// stream of unrelated ICMP keeps the cycle alive.
    pub fn wait_for_reply(&mut self, record: &ProbeRecord) -> Result<WaitOutcome, PingError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }

            let timeout = match self.config.cycle_deadline {
                Some(deadline) => {
                    let elapsed = self.clock.now().saturating_duration_since(record.sent_at);
                    match deadline.checked_sub(elapsed) {
                        Some(remaining) if !remaining.is_zero() => remaining.min(POLL_TIMEOUT),
                        _ => return Ok(WaitOutcome::TimedOut),
                    }
                }
                None => POLL_TIMEOUT,
            };

            let received = match self.transport.recv_timeout(&mut self.buffer, timeout) {
                Ok(Some(received)) => received,
                Ok(None) => return Ok(WaitOutcome::TimedOut),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(PingError::Io(e)),
            };

            if received.truncated {
                log::debug!(
                    "Datagram from {} cut to {} bytes",
                    received.source,
                    received.len
                );
            }

            let packet = match decode(&self.buffer[..received.len]) {
                Ok(packet) => packet,
                Err(e) => {
                    log::debug!("Discarding datagram from {}: {}", received.source, e);
                    continue;
                }
            };

            if packet.icmp_type != IcmpKind::EchoReply || packet.identifier != self.identifier {
                log::trace!(
                    "Ignoring ICMP type {} id {} seq {} from {}",
                    packet.icmp_type.as_u8(),
                    packet.identifier,
                    packet.sequence,
                    received.source
                );
                continue;
            }

            return Ok(WaitOutcome::Matched(MatchedReply {
                sequence: packet.sequence,
                bytes: received.len,
                from: received.source,
                received_at: self.clock.now(),
            }));
        }
    }

    /// Sleep between cycles, waking early on cancellation
    fn pause(&self, duration: Duration) {
        let until = Instant::now() + duration;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= until {
                break;
            }
            std::thread::sleep((until - now).min(SLEEP_SLICE));
        }
    }
}
