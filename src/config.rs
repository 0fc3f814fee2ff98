use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::Args;
use crate::prefs::Prefs;
use crate::probe::DEFAULT_PAYLOAD;

/// Runtime configuration derived from CLI args and saved preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Destination host as given by the user
    pub destination: String,
    /// Number of cycles to run (None = until cancelled)
    pub count: Option<u64>,
    /// Pause after a matched reply
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Wall-clock budget per cycle. None keeps the per-poll timeout only,
    /// so unrelated ICMP traffic can extend a cycle indefinitely.
    #[serde(default, with = "option_duration_serde")]
    pub cycle_deadline: Option<Duration>,
    /// Echo payload
    pub payload: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: String::new(),
            count: None,
            interval: Duration::from_secs(1),
            cycle_deadline: None,
            payload: DEFAULT_PAYLOAD.to_vec(),
        }
    }
}

impl Config {
    /// Configuration for `destination` with everything else at defaults
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count_limit(count);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycle_deadline(mut self, deadline: Duration) -> Self {
        self.cycle_deadline = Some(deadline);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Build from CLI args, falling back to saved preferences, then defaults
    pub fn from_args(args: &Args, prefs: &Prefs) -> Self {
        let defaults = Self::default();

        let count = args.count.or(prefs.count).unwrap_or(0);
        let interval = args
            .interval_duration()
            .or_else(|| prefs.interval.and_then(|secs| pref_seconds("interval", secs)))
            .unwrap_or(defaults.interval);
        let cycle_deadline = args.deadline_duration().or_else(|| {
            prefs
                .deadline
                .and_then(|secs| pref_seconds("deadline", secs))
                .filter(|d| !d.is_zero())
        });
        let payload = args
            .payload
            .clone()
            .or_else(|| prefs.payload.clone())
            .map(String::into_bytes)
            .unwrap_or(defaults.payload);

        Self {
            destination: args.destination.clone(),
            count: count_limit(count),
            interval,
            cycle_deadline,
            payload,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self::from_args(args, &Prefs::default())
    }
}

/// Saved seconds value as a Duration, or None if it cannot be one
fn pref_seconds(name: &str, secs: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Some(duration),
        Err(e) => {
            log::warn!("Ignoring saved {} of {} seconds: {}", name, secs, e);
            None
        }
    }
}

/// 0 means unbounded
fn count_limit(count: u64) -> Option<u64> {
    if count == 0 { None } else { Some(count) }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
