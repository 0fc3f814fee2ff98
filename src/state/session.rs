use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::error::PingError;

/// One probe in flight: created at send time, completed at receive time
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    pub sequence: u16,
    pub sent_at: Instant,
    pub rtt_ms: Option<f64>,
}

impl ProbeRecord {
    pub fn new(sequence: u16, sent_at: Instant) -> Self {
        Self {
            sequence,
            sent_at,
            rtt_ms: None,
        }
    }

    /// Mark the probe answered at `received_at`, returning the RTT in milliseconds
    pub fn complete(&mut self, received_at: Instant) -> f64 {
        let rtt = duration_ms(received_at.saturating_duration_since(self.sent_at));
        self.rtt_ms = Some(rtt);
        rtt
    }
}

/// Destination being pinged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub original: String,
    pub resolved: Ipv4Addr,
}

impl Target {
    pub fn new(original: String, resolved: Ipv4Addr) -> Self {
        Self { original, resolved }
    }
}

/// Counters and RTT samples for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    /// Cycles attempted
    pub transmitted: u64,
    /// Replies matched
    pub received: u64,
    /// RTT samples in milliseconds, in send order
    pub samples: Vec<f64>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            transmitted: 0,
            received: 0,
            samples: Vec::new(),
        }
    }

    pub fn record_sent(&mut self) {
        self.transmitted += 1;
    }

    pub fn record_reply(&mut self, rtt_ms: f64) {
        self.received += 1;
        self.samples.push(rtt_ms);
    }

    /// Packet loss percentage
    ///
    /// Uses integer division of received by transmitted, so any partial loss
    /// below 100% reports as 100 (e.g. 1 of 3 received). Full delivery
    /// reports 0.
    pub fn packet_loss_percent(&self) -> u64 {
        if self.received == 0 || self.transmitted == 0 {
            100
        } else {
            100 - 100 * (self.received / self.transmitted)
        }
    }

    /// Sum of all RTT samples in milliseconds
    pub fn total_rtt_ms(&self) -> f64 {
        self.samples.iter().sum()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            transmitted: self.transmitted,
            received: self.received,
            packet_loss_percent: self.packet_loss_percent(),
            total_rtt_ms: self.total_rtt_ms(),
            rtt: RttStats::from_samples(&self.samples).ok(),
        }
    }
}

/// Final figures for a run
///
/// `rtt` is `None` when no reply was received; [`Summary::rtt_stats`] turns
/// that into [`PingError::NoSamples`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub transmitted: u64,
    pub received: u64,
    pub packet_loss_percent: u64,
    pub total_rtt_ms: f64,
    pub rtt: Option<RttStats>,
}

impl Summary {
    pub fn rtt_stats(&self) -> Result<&RttStats, PingError> {
        self.rtt.as_ref().ok_or(PingError::NoSamples)
    }
}

/// min/avg/max/mdev over the RTT samples, each rounded to 3 decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    /// Population standard deviation
    pub mdev: f64,
}

impl RttStats {
    pub fn from_samples(samples: &[f64]) -> Result<Self, PingError> {
        if samples.is_empty() {
            return Err(PingError::NoSamples);
        }

        let count = samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / count;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;

        Ok(Self {
            min: round3(min),
            avg: round3(mean),
            max: round3(max),
            mdev: round3(variance.sqrt()),
        })
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(transmitted: u64, samples: &[f64]) -> SessionStats {
        let mut stats = SessionStats::new();
        for _ in 0..transmitted {
            stats.record_sent();
        }
        for &s in samples {
            stats.record_reply(s);
        }
        stats
    }

    #[test]
    fn test_initial_state() {
        let stats = SessionStats::new();
        assert_eq!(stats.transmitted, 0);
        assert_eq!(stats.received, 0);
        assert!(stats.samples.is_empty());
        assert_eq!(stats.packet_loss_percent(), 100);
    }

    #[test]
    fn test_loss_none_received() {
        let stats = stats_with(10, &[]);
        assert_eq!(stats.packet_loss_percent(), 100);
    }

    #[test]
    fn test_loss_all_received() {
        let stats = stats_with(4, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.packet_loss_percent(), 0);
    }

    #[test]
    fn test_loss_partial_uses_floor_division() {
        // 1/3 truncates to 0, so one reply out of three still reports 100% loss
        let stats = stats_with(3, &[5.0]);
        assert_eq!(stats.packet_loss_percent(), 100);

        let stats = stats_with(2, &[5.0]);
        assert_eq!(stats.packet_loss_percent(), 100);
    }

    #[test]
    fn test_rtt_stats_population_stddev() {
        let rtt = RttStats::from_samples(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(rtt.min, 10.0);
        assert_eq!(rtt.max, 30.0);
        assert_eq!(rtt.avg, 20.0);
        assert_eq!(rtt.mdev, 8.165);
    }

    #[test]
    fn test_rtt_stats_single_sample() {
        let rtt = RttStats::from_samples(&[12.3456]).unwrap();
        assert_eq!(rtt.min, 12.346);
        assert_eq!(rtt.avg, 12.346);
        assert_eq!(rtt.max, 12.346);
        assert_eq!(rtt.mdev, 0.0);
    }

    #[test]
    fn test_rtt_stats_unordered_samples() {
        let rtt = RttStats::from_samples(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(rtt.min, 1.0);
        assert_eq!(rtt.max, 3.0);
    }

    #[test]
    fn test_rtt_stats_no_samples() {
        assert!(matches!(RttStats::from_samples(&[]), Err(PingError::NoSamples)));
    }

    #[test]
    fn test_summary_without_replies() {
        let summary = stats_with(5, &[]).summary();
        assert_eq!(summary.transmitted, 5);
        assert_eq!(summary.received, 0);
        assert_eq!(summary.packet_loss_percent, 100);
        assert_eq!(summary.total_rtt_ms, 0.0);
        assert!(summary.rtt.is_none());
        assert!(matches!(summary.rtt_stats(), Err(PingError::NoSamples)));
    }

    #[test]
    fn test_summary_with_replies() {
        let summary = stats_with(3, &[10.0, 20.0, 30.0]).summary();
        assert_eq!(summary.received, 3);
        assert_eq!(summary.packet_loss_percent, 0);
        assert_eq!(summary.total_rtt_ms, 60.0);
        assert_eq!(summary.rtt_stats().unwrap().mdev, 8.165);
    }

    #[test]
    fn test_samples_keep_send_order() {
        let stats = stats_with(3, &[30.0, 10.0, 20.0]);
        assert_eq!(stats.samples, vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn test_probe_record_complete() {
        let sent = Instant::now();
        let mut record = ProbeRecord::new(7, sent);
        assert!(record.rtt_ms.is_none());

        let rtt = record.complete(sent + Duration::from_micros(2500));
        assert!((rtt - 2.5).abs() < 1e-9);
        assert_eq!(record.rtt_ms, Some(rtt));
    }

    #[test]
    fn test_summary_serialization() {
        let summary = stats_with(2, &[1.5, 2.5]).summary();
        let json = serde_json::to_string(&summary).unwrap();
        let restored: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, summary);
    }
}
