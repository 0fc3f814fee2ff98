use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};

use crate::ping::PingEvent;
use crate::state::Summary;

/// Banner printed before the first request
pub fn format_header(
    destination: &str,
    address: Ipv4Addr,
    header_len: usize,
    payload_len: usize,
) -> String {
    format!(
        "PING {} ({}) {}({}) bytes of data.",
        destination,
        address,
        payload_len,
        header_len + payload_len
    )
}

/// One line per matched reply
pub fn format_reply(bytes: usize, from: IpAddr, sequence: u16, rtt_ms: f64) -> String {
    format!(
        "{} bytes from {} ({}): icmp_seq={} ttl=64 time={:.3} ms",
        bytes, from, from, sequence, rtt_ms
    )
}

/// Write the live line for an engine event (timeouts print nothing)
pub fn write_event<W: Write>(event: &PingEvent, mut writer: W) -> std::io::Result<()> {
    match event {
        PingEvent::Started {
            destination,
            address,
            header_len,
            payload_len,
        } => writeln!(
            writer,
            "{}",
            format_header(destination, *address, *header_len, *payload_len)
        ),
        PingEvent::Reply {
            sequence,
            bytes,
            from,
            rtt_ms,
        } => writeln!(writer, "{}", format_reply(*bytes, *from, *sequence, *rtt_ms)),
        PingEvent::Timeout { .. } => Ok(()),
    }
}

/// Generate the closing statistics block
pub fn generate_report<W: Write>(
    destination: &str,
    summary: &Summary,
    mut writer: W,
) -> std::io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "--- {} ping statistics ---", destination)?;
    writeln!(
        writer,
        "{} packets transmitted, {} received, {}% packet loss, time {:.3}ms",
        summary.transmitted, summary.received, summary.packet_loss_percent, summary.total_rtt_ms
    )?;

    if let Ok(rtt) = summary.rtt_stats() {
        writeln!(
            writer,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            rtt.min, rtt.avg, rtt.max, rtt.mdev
        )?;
    }

    Ok(())
}

/// Generate report to string
pub fn generate_report_string(destination: &str, summary: &Summary) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = generate_report(destination, summary, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionStats;

    #[test]
    fn test_header_line() {
        let line = format_header("example.com", Ipv4Addr::new(93, 184, 216, 34), 8, 9);
        assert_eq!(line, "PING example.com (93.184.216.34) 9(17) bytes of data.");
    }

    #[test]
    fn test_reply_line() {
        let line = format_reply(37, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 4, 12.34567);
        assert_eq!(
            line,
            "37 bytes from 10.0.0.1 (10.0.0.1): icmp_seq=4 ttl=64 time=12.346 ms"
        );
    }

    #[test]
    fn test_timeout_event_prints_nothing() {
        let mut buf = Vec::new();
        write_event(&PingEvent::Timeout { sequence: 2 }, &mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_report_with_samples() {
        let mut stats = SessionStats::new();
        for rtt in [10.0, 20.0, 30.0] {
            stats.record_sent();
            stats.record_reply(rtt);
        }
        let report = generate_report_string("host", &stats.summary());

        assert!(report.contains("--- host ping statistics ---"));
        assert!(report.contains("3 packets transmitted, 3 received, 0% packet loss, time 60.000ms"));
        assert!(report.contains("rtt min/avg/max/mdev = 10.000/20.000/30.000/8.165 ms"));
    }

    #[test]
    fn test_report_without_samples_omits_rtt() {
        let mut stats = SessionStats::new();
        stats.record_sent();
        stats.record_sent();
        let report = generate_report_string("host", &stats.summary());

        assert!(report.contains("2 packets transmitted, 0 received, 100% packet loss"));
        assert!(!report.contains("rtt min/avg/max/mdev"));
    }
}
