use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpType};
use pnet::packet::{MutablePacket, Packet};
use serde::{Deserialize, Serialize};

use crate::error::PingError;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// IPv4 header size assumed in front of every raw-socket datagram (no options)
pub const IPV4_HEADER_SIZE: usize = 20;
/// Smallest datagram that can carry an echo message
pub const MIN_DATAGRAM_SIZE: usize = IPV4_HEADER_SIZE + ICMP_HEADER_SIZE;
/// Default echo payload
pub const DEFAULT_PAYLOAD: &[u8] = b"Ping Pong";

const TYPE_ECHO_REPLY: u8 = 0;
const TYPE_ECHO_REQUEST: u8 = 8;

/// ICMP message type as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcmpKind {
    EchoReply,
    EchoRequest,
    Other(u8),
}

impl IcmpKind {
    pub fn as_u8(self) -> u8 {
        match self {
            IcmpKind::EchoReply => TYPE_ECHO_REPLY,
            IcmpKind::EchoRequest => TYPE_ECHO_REQUEST,
            IcmpKind::Other(t) => t,
        }
    }
}

impl From<u8> for IcmpKind {
    fn from(value: u8) -> Self {
        match value {
            TYPE_ECHO_REPLY => IcmpKind::EchoReply,
            TYPE_ECHO_REQUEST => IcmpKind::EchoRequest,
            other => IcmpKind::Other(other),
        }
    }
}

/// A decoded ICMP echo message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoPacket {
    pub icmp_type: IcmpKind,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

/// Output of [`encode`]: the wire bytes plus sizes for the "PING" banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub bytes: Vec<u8>,
    pub header_len: usize,
    pub payload_len: usize,
}

/// Get process identifier for ICMP identification field
pub fn get_identifier() -> u16 {
    std::process::id() as u16
}

/// Internet checksum (RFC 1071) over big-endian 16-bit words
///
/// An odd trailing byte is padded with zero. Running this over a packet that
/// already carries a valid checksum yields 0.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    if let [last] = chunks.remainder() {
        sum += u16::from_be_bytes([*last, 0]) as u32;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Build an ICMP Echo Request
pub fn encode(identifier: u16, sequence: u16, payload: &[u8]) -> EncodedPacket {
    encode_with_type(IcmpKind::EchoRequest, identifier, sequence, payload)
}

/// Build an echo-layout ICMP message of any type (replies are forged this way in tests)
pub fn encode_with_type(
    icmp_type: IcmpKind,
    identifier: u16,
    sequence: u16,
    payload: &[u8],
) -> EncodedPacket {
    let mut buffer = vec![0u8; ICMP_HEADER_SIZE + payload.len()];

    {
        // Buffer is sized for the header above, so the view always exists
        let mut packet =
            MutableEchoRequestPacket::new(&mut buffer).expect("buffer holds an ICMP echo header");
        packet.set_icmp_type(IcmpType::new(icmp_type.as_u8()));
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_checksum(0);
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.payload_mut().copy_from_slice(payload);
    }

    let cksum = internet_checksum(&buffer);
    buffer[2..4].copy_from_slice(&cksum.to_be_bytes());

    EncodedPacket {
        bytes: buffer,
        header_len: ICMP_HEADER_SIZE,
        payload_len: payload.len(),
    }
}

/// Decode a raw-socket datagram (IPv4 header + ICMP echo message)
///
/// The IPv4 header is taken to be exactly 20 bytes. The checksum is read but
/// not verified.
pub fn decode(datagram: &[u8]) -> Result<EchoPacket, PingError> {
    if datagram.len() < MIN_DATAGRAM_SIZE {
        return Err(PingError::MalformedPacket {
            len: datagram.len(),
        });
    }

    let icmp = EchoReplyPacket::new(&datagram[IPV4_HEADER_SIZE..]).ok_or(
        PingError::MalformedPacket {
            len: datagram.len(),
        },
    )?;

    Ok(EchoPacket {
        icmp_type: IcmpKind::from(icmp.get_icmp_type().0),
        code: icmp.get_icmp_code().0,
        checksum: icmp.get_checksum(),
        identifier: icmp.get_identifier(),
        sequence: icmp.get_sequence_number(),
        payload: icmp.payload().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ip_header(icmp: &[u8]) -> Vec<u8> {
        let mut datagram = vec![0u8; IPV4_HEADER_SIZE];
        datagram[0] = 0x45; // version 4, IHL 5
        datagram[9] = 1; // protocol ICMP
        datagram.extend_from_slice(icmp);
        datagram
    }

    #[test]
    fn test_encode_header_layout() {
        let packet = encode(0x1234, 0x0102, DEFAULT_PAYLOAD);
        assert_eq!(packet.header_len, ICMP_HEADER_SIZE);
        assert_eq!(packet.payload_len, DEFAULT_PAYLOAD.len());
        assert_eq!(packet.bytes.len(), ICMP_HEADER_SIZE + DEFAULT_PAYLOAD.len());
        assert_eq!(packet.bytes[0], 8); // Echo Request type
        assert_eq!(packet.bytes[1], 0); // Code
        assert_eq!(&packet.bytes[4..6], &[0x12, 0x34]);
        assert_eq!(&packet.bytes[6..8], &[0x01, 0x02]);
        assert_eq!(&packet.bytes[8..], DEFAULT_PAYLOAD);
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode(7, 9, b"abc"), encode(7, 9, b"abc"));
    }

    #[test]
    fn test_checksum_self_cancels() {
        let payloads: [&[u8]; 5] = [b"", b"x", b"Ping Pong", b"even", &[0xFF; 33]];
        for payload in payloads {
            let packet = encode(4242, 17, payload);
            assert_eq!(internet_checksum(&packet.bytes), 0, "payload {:?}", payload);
        }
    }

    #[test]
    fn test_checksum_known_vector() {
        // RFC 1071 section 3 example words
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(internet_checksum(&data), !0xddf2);
    }

    #[test]
    fn test_checksum_odd_length_pads_with_zero() {
        assert_eq!(internet_checksum(&[0xAB]), internet_checksum(&[0xAB, 0x00]));
    }

    #[test]
    fn test_checksum_matches_pnet() {
        use pnet::packet::icmp::IcmpPacket;

        let packet = encode(0xBEEF, 300, b"Ping Pong");
        let view = IcmpPacket::new(&packet.bytes).unwrap();
        assert_eq!(pnet::packet::icmp::checksum(&view), view.get_checksum());
    }

    #[test]
    fn test_decode_inverts_encode() {
        let packet = encode(31337, 5, DEFAULT_PAYLOAD);
        let decoded = decode(&with_ip_header(&packet.bytes)).unwrap();

        assert_eq!(decoded.icmp_type, IcmpKind::EchoRequest);
        assert_eq!(decoded.code, 0);
        assert_eq!(decoded.identifier, 31337);
        assert_eq!(decoded.sequence, 5);
        assert_eq!(decoded.payload, DEFAULT_PAYLOAD);
        assert_eq!(decoded.checksum, u16::from_be_bytes([packet.bytes[2], packet.bytes[3]]));
    }

    #[test]
    fn test_decode_reply_type() {
        let packet = encode_with_type(IcmpKind::EchoReply, 1, 2, b"");
        let decoded = decode(&with_ip_header(&packet.bytes)).unwrap();
        assert_eq!(decoded.icmp_type, IcmpKind::EchoReply);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_decode_short_datagram_is_malformed() {
        for len in 0..MIN_DATAGRAM_SIZE {
            let datagram = vec![0u8; len];
            match decode(&datagram) {
                Err(PingError::MalformedPacket { len: l }) => assert_eq!(l, len),
                other => panic!("expected MalformedPacket for {} bytes, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_decode_accepts_bad_checksum() {
        let mut packet = encode(10, 20, b"data").bytes;
        packet[2] ^= 0xFF;
        let decoded = decode(&with_ip_header(&packet)).unwrap();
        assert_eq!(decoded.identifier, 10);
        assert_ne!(internet_checksum(&packet), 0);
    }

    #[test]
    fn test_icmp_kind_conversion() {
        assert_eq!(IcmpKind::from(0), IcmpKind::EchoReply);
        assert_eq!(IcmpKind::from(8), IcmpKind::EchoRequest);
        assert_eq!(IcmpKind::from(11), IcmpKind::Other(11));
        assert_eq!(IcmpKind::Other(3).as_u8(), 3);
    }
}
