//! In-memory transport and clock for driving the engine without a network.

use pnet::packet::MutablePacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crate::ping::Clock;
use crate::probe::{
    IPV4_HEADER_SIZE, IcmpKind, RecvResult, Transport, decode, encode_with_type,
};

/// What the next poll of a [`MockTransport`] yields
#[derive(Debug, Clone)]
pub enum Inbound {
    Datagram { bytes: Vec<u8>, source: IpAddr },
    /// An empty poll window
    Silence,
    Error(io::ErrorKind),
}

impl Inbound {
    /// Datagram from the source address written in its IPv4 header
    pub fn datagram(bytes: Vec<u8>) -> Self {
        let source = if bytes.len() >= IPV4_HEADER_SIZE {
            Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15])
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        Inbound::Datagram {
            bytes,
            source: IpAddr::V4(source),
        }
    }
}

type Responder = Box<dyn FnMut(&[u8], Ipv4Addr) -> Vec<Inbound> + Send>;

/// Transport that records sent packets on a channel and answers from a script
///
/// After each send, the responder may queue more inbound datagrams. Polling an
/// empty queue behaves like a poll window with no data.
pub struct MockTransport {
    sent: Sender<Box<[u8]>>,
    inbox: VecDeque<Inbound>,
    responder: Responder,
    send_error: Option<io::ErrorKind>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> (Self, Receiver<Box<[u8]>>)
    where
        F: FnMut(&[u8], Ipv4Addr) -> Vec<Inbound> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let transport = MockTransport {
            sent: tx,
            inbox: VecDeque::new(),
            responder: Box::new(responder),
            send_error: None,
        };
        (transport, rx)
    }

    /// Replies to every request with a well-formed echo reply
    pub fn echoing() -> (Self, Receiver<Box<[u8]>>) {
        Self::new(|request, dest| vec![echo_reply_for(request, dest)])
    }

    /// Never answers
    pub fn silent() -> (Self, Receiver<Box<[u8]>>) {
        Self::new(|_, _| Vec::new())
    }

    /// Fixed inbound sequence, independent of what is sent
    pub fn scripted(inbound: Vec<Inbound>) -> (Self, Receiver<Box<[u8]>>) {
        let (mut transport, rx) = Self::silent();
        transport.inbox.extend(inbound);
        (transport, rx)
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&mut self, kind: io::ErrorKind) {
        self.send_error = Some(kind);
    }
}

impl Transport for MockTransport {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        if let Some(kind) = self.send_error {
            return Err(kind.into());
        }
        let _ = self.sent.send(packet.to_vec().into_boxed_slice());
        let replies = (self.responder)(packet, dest);
        self.inbox.extend(replies);
        Ok(packet.len())
    }

    fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> io::Result<Option<RecvResult>> {
        match self.inbox.pop_front() {
            Some(Inbound::Datagram { bytes, source }) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some(RecvResult {
                    len,
                    source,
                    truncated: bytes.len() > len,
                }))
            }
            Some(Inbound::Error(kind)) => Err(kind.into()),
            Some(Inbound::Silence) | None => Ok(None),
        }
    }
}

/// Prepend a minimal IPv4 header (no options) to an ICMP message
pub fn with_ipv4_header(icmp: &[u8], source: Ipv4Addr) -> Vec<u8> {
    let mut buffer = vec![0u8; IPV4_HEADER_SIZE + icmp.len()];
    if let Some(mut ip) = MutableIpv4Packet::new(&mut buffer) {
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_total_length((IPV4_HEADER_SIZE + icmp.len()) as u16);
        ip.set_ttl(64);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        ip.set_source(source);
        ip.payload_mut().copy_from_slice(icmp);
    }
    buffer
}

/// Echo reply a well-behaved host would send back for `request`
///
/// `request` is the ICMP message as sent (no IP header). Anything that is not
/// an echo request gets no answer.
pub fn echo_reply_for(request: &[u8], from: Ipv4Addr) -> Inbound {
    let as_datagram = with_ipv4_header(request, Ipv4Addr::UNSPECIFIED);
    match decode(&as_datagram) {
        Ok(packet) if packet.icmp_type == IcmpKind::EchoRequest => {
            let reply = encode_with_type(
                IcmpKind::EchoReply,
                packet.identifier,
                packet.sequence,
                &packet.payload,
            );
            Inbound::datagram(with_ipv4_header(&reply.bytes, from))
        }
        _ => Inbound::Silence,
    }
}

/// Clock that moves forward by a fixed step on every read
#[derive(Debug)]
pub struct StepClock {
    base: Instant,
    step: Duration,
    ticks: Cell<u32>,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            base: Instant::now(),
            step,
            ticks: Cell::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Instant {
        let ticks = self.ticks.get();
        self.ticks.set(ticks + 1);
        self.base + self.step * ticks
    }
}
