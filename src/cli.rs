use clap::Parser;
use std::time::Duration;

/// Minimal ICMP echo client with per-reply RTT and summary statistics
#[derive(Parser, Debug, Clone)]
#[command(name = "rping")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Destination host (IPv4 address or hostname)
    pub destination: String,

    /// Number of echo requests to send (0 = until interrupted)
    #[arg(short = 'c', long = "count")]
    pub count: Option<u64>,

    /// Seconds to wait after a reply before the next request
    #[arg(short = 'i', long = "interval")]
    pub interval: Option<f64>,

    /// Give up on a request after this many seconds even if unrelated ICMP keeps arriving
    #[arg(short = 'W', long = "deadline")]
    pub deadline: Option<f64>,

    /// Echo payload text
    #[arg(long = "payload")]
    pub payload: Option<String>,

    /// Print the summary as JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Get probe interval as Duration
    pub fn interval_duration(&self) -> Option<Duration> {
        self.interval.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Get per-cycle deadline as Duration
    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
    }

    /// Log level implied by the -v count
    pub fn log_spec(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.destination.trim().is_empty() {
            return Err("Destination cannot be empty".into());
        }

        if let Some(interval) = self.interval
            && Duration::try_from_secs_f64(interval).is_err()
        {
            return Err(format!("Interval {} is not a valid number of seconds", interval));
        }

        if let Some(deadline) = self.deadline
            && !Duration::try_from_secs_f64(deadline).is_ok_and(|d| !d.is_zero())
        {
            return Err(format!("Deadline {} must be a positive number of seconds", deadline));
        }

        if let Some(ref payload) = self.payload {
            // Keeps the datagram inside a single 1500-byte Ethernet frame
            const MAX_PAYLOAD: usize = 1472;
            if payload.len() > MAX_PAYLOAD {
                return Err(format!("Payload cannot exceed {} bytes", MAX_PAYLOAD));
            }
        }

        Ok(())
    }
}
