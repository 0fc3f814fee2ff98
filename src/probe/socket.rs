use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::PingError;

/// Receive buffer size per datagram (Ethernet MTU plus slack)
pub const RECV_BUFFER_SIZE: usize = 1508;

/// Result of receiving one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvResult {
    /// Bytes written into the caller's buffer
    pub len: usize,
    pub source: IpAddr,
    /// The datagram did not fit and was cut to `len` bytes
    pub truncated: bool,
}

/// Anything the probe engine can send echo requests through and read replies from
///
/// `recv_timeout` returns `Ok(None)` when nothing became readable within
/// `timeout`.
pub trait Transport {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize>;

    fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<RecvResult>>;
}

/// Raw IPv4 ICMP socket
///
/// Closed when dropped.
#[derive(Debug)]
pub struct IcmpSocket {
    socket: Socket,
}

impl IcmpSocket {
    /// Open a raw ICMP socket in non-blocking mode
    pub fn open() -> Result<Self, PingError> {
        let socket = create_raw_icmp_socket().map_err(|e| {
            if is_permission_error(&e) {
                PingError::Privilege(permission_help())
            } else {
                PingError::Io(e)
            }
        })?;

        if let Err(e) = socket.set_recv_buffer_size(256 * 1024) {
            log::warn!("Could not enlarge ICMP receive buffer: {}", e);
        }

        log::debug!("Opened raw ICMP socket");
        Ok(Self { socket })
    }
}

impl Transport for IcmpSocket {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        send_icmp(&self.socket, packet, dest)
    }

    fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<RecvResult>> {
        if !wait_readable(&self.socket, timeout)? {
            return Ok(None);
        }
        match recv_icmp(&self.socket, buf) {
            Ok(result) => Ok(Some(result)),
            // Readiness can be spurious; treat it like an empty poll
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for IcmpSocket {
    fn drop(&mut self) {
        log::debug!("Closing raw ICMP socket");
    }
}

/// Create a raw IPv4 ICMP socket
pub fn create_raw_icmp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

fn is_permission_error(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::PermissionDenied
        || matches!(e.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
}

fn permission_help() -> String {
    let binary_path = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "rping".to_string());

    format!(
        "Insufficient permissions for raw ICMP sockets.\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo rping <destination>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep {}",
        binary_path
    )
}

/// Send ICMP packet to target
pub fn send_icmp(socket: &Socket, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
    let addr = SocketAddr::new(IpAddr::V4(target), 0);
    socket.send_to(packet, &SockAddr::from(addr))
}

/// Block until the socket is readable or `timeout` passes
///
/// Returns false on timeout. EINTR is reported as "not ready" so the caller
/// gets a chance to check for cancellation.
pub fn wait_readable(socket: &Socket, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(ret > 0 && (pfd.revents & libc::POLLIN) != 0)
}

/// Receive one datagram into `buffer`
///
/// With `MSG_TRUNC` the kernel reports the full datagram length, so a
/// datagram larger than `buffer` comes back flagged as truncated.
pub fn recv_icmp(socket: &Socket, buffer: &mut [u8]) -> io::Result<RecvResult> {
    // SAFETY: an initialized `[u8]` is a valid `[MaybeUninit<u8>]` and the
    // kernel only writes bytes into it
    let uninit = unsafe { &mut *(buffer as *mut [u8] as *mut [MaybeUninit<u8>]) };
    let (datagram_len, addr) = socket.recv_from_with_flags(uninit, libc::MSG_TRUNC)?;

    let source = addr
        .as_socket()
        .map(|s| s.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    Ok(truncation(datagram_len, buffer.len(), source))
}

fn truncation(datagram_len: usize, capacity: usize, source: IpAddr) -> RecvResult {
    RecvResult {
        len: datagram_len.min(capacity),
        source,
        truncated: datagram_len > capacity,
    }
}
