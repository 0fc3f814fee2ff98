use std::fmt;
use std::io;

/// Errors produced by the ping core
///
/// `Privilege`, `Resolution` and `Io` end a run. `MalformedPacket` and
/// `CycleTimeout` are absorbed inside the engine; `NoSamples` comes from the
/// statistics when no reply was ever matched.
#[derive(Debug)]
pub enum PingError {
    /// Raw ICMP socket could not be opened (usually missing root/CAP_NET_RAW)
    Privilege(String),
    /// Destination could not be resolved to an IPv4 address
    Resolution { host: String, reason: String },
    /// Received datagram too short to hold an IPv4 + ICMP header
    MalformedPacket { len: usize },
    /// No matching reply arrived within the poll window
    CycleTimeout { sequence: u16 },
    /// RTT statistics requested but no reply was received
    NoSamples,
    /// Socket I/O failure outside the recoverable set
    Io(io::Error),
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingError::Privilege(msg) => write!(f, "{}", msg),
            PingError::Resolution { host, reason } => {
                write!(f, "cannot resolve {}: {}", host, reason)
            }
            PingError::MalformedPacket { len } => {
                write!(f, "malformed packet: {} bytes is shorter than an IPv4 ICMP echo", len)
            }
            PingError::CycleTimeout { sequence } => {
                write!(f, "no reply for icmp_seq={}", sequence)
            }
            PingError::NoSamples => write!(f, "no replies received, RTT statistics unavailable"),
            PingError::Io(e) => write!(f, "socket error: {}", e),
        }
    }
}

impl std::error::Error for PingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PingError {
    fn from(e: io::Error) -> Self {
        PingError::Io(e)
    }
}
