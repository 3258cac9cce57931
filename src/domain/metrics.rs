use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MonitorError;

/// Agent uptime sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeSample {
    pub time_at: DateTime<Utc>,
    /// sysUpTime in whole seconds
    pub uptime: u64,
}

impl UptimeSample {
    pub fn new(time_at: DateTime<Utc>, uptime: u64) -> Self {
        Self { time_at, uptime }
    }
}

/// Aggregate traffic rate of all interfaces of one agent, in bytes per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub time_at: DateTime<Utc>,
    #[serde(rename = "in")]
    pub in_rate: f64,
    #[serde(rename = "out")]
    pub out_rate: f64,
}

impl TrafficSample {
    pub fn new(time_at: DateTime<Utc>, in_rate: f64, out_rate: f64) -> Self {
        Self {
            time_at,
            in_rate,
            out_rate,
        }
    }
}

/// Time-series sample retained in the recent window
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSample {
    Uptime(UptimeSample),
    Traffic(TrafficSample),
}

impl MetricSample {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Uptime(_) => MetricKind::Uptime,
            Self::Traffic(_) => MetricKind::Traffic,
        }
    }

    pub fn time_at(&self) -> DateTime<Utc> {
        match self {
            Self::Uptime(s) => s.time_at,
            Self::Traffic(s) => s.time_at,
        }
    }
}

/// Live stream kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Uptime,
    Traffic,
    Traps,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uptime => "uptime",
            Self::Traffic => "traffic",
            Self::Traps => "traps",
        };
        f.write_str(name)
    }
}

/// Dashboard time range: how much retained history a stream starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeRange {
    OneMinute,
    #[default]
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    ThreeHours,
    SixHours,
    TwelveHours,
    OneDay,
    TwoDays,
    SevenDays,
    ThirtyDays,
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;

        let secs = match self {
            Self::OneMinute => MINUTE,
            Self::FiveMinutes => 5 * MINUTE,
            Self::FifteenMinutes => 15 * MINUTE,
            Self::OneHour => HOUR,
            Self::ThreeHours => 3 * HOUR,
            Self::SixHours => 6 * HOUR,
            Self::TwelveHours => 12 * HOUR,
            Self::OneDay => DAY,
            Self::TwoDays => 2 * DAY,
            Self::SevenDays => 7 * DAY,
            Self::ThirtyDays => 30 * DAY,
        };
        Duration::from_secs(secs)
    }
}

impl FromStr for TimeRange {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "3h" => Ok(Self::ThreeHours),
            "6h" => Ok(Self::SixHours),
            "12h" => Ok(Self::TwelveHours),
            "24h" => Ok(Self::OneDay),
            "2d" => Ok(Self::TwoDays),
            "7d" => Ok(Self::SevenDays),
            "30d" => Ok(Self::ThirtyDays),
            other => Err(MonitorError::Validation(format!(
                "invalid time_range '{}'",
                other
            ))),
        }
    }
}

/// Width of the octet counters read from the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterWidth {
    #[default]
    Bits32,
    Bits64,
}

impl CounterWidth {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Bits32),
            64 => Some(Self::Bits64),
            _ => None,
        }
    }

    pub fn modulus(&self) -> u128 {
        match self {
            Self::Bits32 => 1u128 << 32,
            Self::Bits64 => 1u128 << 64,
        }
    }
}

/// Increase of a monotonic counter between two readings.
///
/// A decrease is treated as a single wrap at the configured width. The sample
/// is discarded (None) when the previous reading is outside the counter range,
/// or when the wrap-adjusted delta exceeds half the range, which is more
/// plausibly a counter reset than traffic.
pub fn counter_delta(previous: u64, current: u64, width: CounterWidth) -> Option<u64> {
    if current >= previous {
        return Some(current - previous);
    }

    let modulus = width.modulus();
    let wrapped = (current as u128 + modulus).checked_sub(previous as u128)?;
    if wrapped >= modulus || wrapped > modulus / 2 {
        return None;
    }
    u64::try_from(wrapped).ok()
}

/// Per-second rate of a counter delta; zero or negative elapsed time yields None
pub fn counter_rate(delta: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(delta as f64 / secs)
}
