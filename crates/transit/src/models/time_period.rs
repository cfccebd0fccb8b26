//! Time-of-day periods.
//!
//! Periods are clock ranges such as `AM = 6:00-9:00`. A period whose start is
//! after its end (e.g. `NT = 19:00-6:00`) wraps past midnight.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::types::{Result, TransitError};

/// Parse `"H:MM"`, `"HH:MM"` or `"HH:MM:SS"`.
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| TransitError::InvalidTime(value.to_string()))
}

/// Format as zero-padded `"HH:MM"`.
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Seconds past midnight for a feed time such as `"25:30:00"`.
///
/// Feed times may exceed 24 hours for service running past midnight.
pub fn feed_time_to_secs(value: &str) -> Result<u32> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(TransitError::InvalidTime(value.to_string()));
    }
    let invalid = || TransitError::InvalidTime(value.to_string());
    let mut secs = 0u32;
    for (part, unit) in parts.iter().zip([3600u32, 60, 1]) {
        let n: u32 = part.parse().map_err(|_| invalid())?;
        secs = n
            .checked_mul(unit)
            .and_then(|n| secs.checked_add(n))
            .ok_or_else(invalid)?;
    }
    Ok(secs)
}

pub fn secs_to_feed_time(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// A clock range. `start > end` means the range wraps midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSpan {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Span between whole hours, wrapping past midnight.
    pub fn from_hours(start: i64, end: i64) -> Self {
        let midnight = NaiveTime::default();
        Self::new(
            midnight + Duration::hours(start.rem_euclid(24)),
            midnight + Duration::hours(end.rem_euclid(24)),
        )
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_clock(start)?, parse_clock(end)?))
    }

    pub fn spans_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Start and end in minutes past midnight, end unwrapped past 24:00.
    pub fn minutes(&self) -> (u32, u32) {
        let start = self.start.num_seconds_from_midnight() / 60;
        let mut end = self.end.num_seconds_from_midnight() / 60;
        if end <= start {
            end += 24 * 60;
        }
        (start, end)
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.spans_midnight() {
            time >= self.start || time < self.end
        } else {
            time >= self.start && time < self.end
        }
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        let (a0, a1) = self.minutes();
        let (b0, b1) = other.minutes();
        let (a0, a1, b0, b1) = (a0 as i64, a1 as i64, b0 as i64, b1 as i64);
        // Shift by a day either way so wrapped ranges meet unwrapped ones.
        [-1440, 0, 1440]
            .iter()
            .any(|shift| a0 < b1 + shift && b0 + shift < a1)
    }

    pub fn to_strings(&self) -> [String; 2] {
        [format_clock(self.start), format_clock(self.end)]
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_clock(self.start), format_clock(self.end))
    }
}

impl Serialize for TimeSpan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeSpan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let [start, end] = <[String; 2]>::deserialize(deserializer)?;
        TimeSpan::parse(&start, &end).map_err(serde::de::Error::custom)
    }
}

/// Named time periods, keyed by abbreviation (e.g. `AM`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePeriodTable(BTreeMap<String, TimeSpan>);

impl TimePeriodTable {
    pub fn new(periods: impl IntoIterator<Item = (String, TimeSpan)>) -> Self {
        Self(periods.into_iter().collect())
    }

    pub fn span(&self, abbr: &str) -> Result<TimeSpan> {
        self.0
            .get(abbr)
            .copied()
            .ok_or_else(|| TransitError::UnknownTimePeriod(abbr.to_string()))
    }

    pub fn contains(&self, abbr: &str) -> bool {
        self.0.contains_key(abbr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSpan)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn abbreviations(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Period for a time given as seconds past midnight.
    ///
    /// The period spanning midnight is the fallback; otherwise the period
    /// with the latest start not after `secs` wins.
    pub fn period_for_time(&self, secs: u32) -> Option<&str> {
        let time = NaiveTime::from_num_seconds_from_midnight_opt(secs % 86_400, 0)?;
        let overnight = self
            .0
            .iter()
            .find(|(_, span)| span.spans_midnight())
            .map(|(abbr, _)| abbr.as_str());

        self.0
            .iter()
            .filter(|(_, span)| span.start <= time)
            .max_by_key(|(_, span)| span.start)
            .map(|(abbr, _)| abbr.as_str())
            .or(overnight)
    }

    /// Earliest start to latest end over the given periods.
    pub fn bounding_span<'a>(&self, abbrs: impl IntoIterator<Item = &'a str>) -> Result<TimeSpan> {
        let mut bounds: Option<(NaiveTime, NaiveTime)> = None;
        for abbr in abbrs {
            let span = self.span(abbr)?;
            bounds = Some(match bounds {
                None => (span.start, span.end),
                Some((start, end)) => (start.min(span.start), end.max(span.end)),
            });
        }
        let (start, end) = bounds
            .ok_or_else(|| TransitError::InvalidData("no time periods to bound".to_string()))?;
        if start > end {
            return Err(TransitError::InvalidData(format!(
                "Start time ({}) is after end time ({})",
                format_clock(start),
                format_clock(end)
            )));
        }
        Ok(TimeSpan::new(start, end))
    }

    /// Period whose span matches exactly, else the one containing `span.start`.
    pub fn period_for_span(&self, span: &TimeSpan) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, s)| *s == span)
            .or_else(|| self.0.iter().find(|(_, s)| s.contains(span.start)))
            .map(|(abbr, _)| abbr.as_str())
    }
}
