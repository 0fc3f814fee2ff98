use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use crate::error::PingError;

/// Resolve a destination to an IPv4 address
///
/// IP literals are used as-is (IPv6 literals are rejected); hostnames go
/// through the system resolver and the first IPv4 answer wins.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, PingError> {
    let resolution_error = |reason: String| PingError::Resolution {
        host: host.to_string(),
        reason,
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(resolution_error("IPv6 destinations are not supported".into())),
        };
    }

    if host.is_empty() {
        return Err(resolution_error("empty hostname".into()));
    }

    let addrs = format!("{}:0", host)
        .to_socket_addrs()
        .map_err(|e| resolution_error(e.to_string()))?;

    addrs
        .filter_map(|s| match s.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| resolution_error("no IPv4 addresses found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ipv4_literal() {
        assert_eq!(resolve_ipv4("192.0.2.7").unwrap(), Ipv4Addr::new(192, 0, 2, 7));
    }

    #[test]
    fn test_resolve_rejects_ipv6_literal() {
        match resolve_ipv4("2001:db8::1") {
            Err(PingError::Resolution { host, reason }) => {
                assert_eq!(host, "2001:db8::1");
                assert!(reason.contains("IPv6"));
            }
            other => panic!("expected Resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_empty_host() {
        assert!(matches!(resolve_ipv4(""), Err(PingError::Resolution { .. })));
    }

    #[test]
    fn test_resolve_localhost() {
        // localhost resolves without network access on any sane host
        if let Ok(ip) = resolve_ipv4("localhost") {
            assert!(ip.is_loopback());
        }
    }
}
