use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub trait DurationExt {
    fn format_colon_separated(&self) -> String;
}

impl DurationExt for Duration {
    /// `HH:MM:SS:mmm`; hours are not wrapped into days
    fn format_colon_separated(&self) -> String {
        let total_seconds = self.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        let millis = self.subsec_millis();

        format!("{:02}:{:02}:{:02}:{:03}", hours, minutes, seconds, millis)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TimeUnit {
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "h" | "hr" | "hrs" | "hours" => Some(Self::Hours),
            "m" | "min" | "mins" | "minutes" => Some(Self::Minutes),
            "s" | "sec" | "secs" | "seconds" => Some(Self::Seconds),
            "ms" | "milli" | "millis" | "milliseconds" => Some(Self::Milliseconds),
            "" => Some(Self::Seconds),
            _ => None,
        }
    }

    fn to_duration(&self, count: u64) -> Option<Duration> {
        match self {
            Self::Hours => count.checked_mul(3600).map(Duration::from_secs),
            Self::Minutes => count.checked_mul(60).map(Duration::from_secs),
            Self::Seconds => Some(Duration::from_secs(count)),
            Self::Milliseconds => Some(Duration::from_millis(count)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDurationError {
    #[error("failed to parse count: {0}")]
    BadCount(#[source] ParseIntError),
    #[error("invalid unit {0:?}")]
    BadUnit(String),
    #[error("duration is too long")]
    Overflow,
}

/// Parse one component such as `5m`, `90s`, `500ms` or a bare `30` (seconds)
pub fn parse_duration_component(component: &str) -> Result<Duration, ParseDurationError> {
    use ParseDurationError::*;
    let component = component.trim();
    let split_point = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    let (count_str, unit_str) = component.split_at(split_point);
    let count = u64::from_str(count_str).map_err(BadCount)?;
    let unit = TimeUnit::parse(unit_str).ok_or_else(|| BadUnit(unit_str.to_string()))?;
    unit.to_duration(count).ok_or(Overflow)
}

/// Sum of several components, e.g. `["1h", "30m"]`
pub fn sum_durations(durations: &[Duration]) -> Result<Duration, ParseDurationError> {
    durations
        .iter()
        .try_fold(Duration::ZERO, |acc, d| acc.checked_add(*d))
        .ok_or(ParseDurationError::Overflow)
}
