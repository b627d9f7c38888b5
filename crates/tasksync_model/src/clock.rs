//! Time normalization.
//!
//! Rows written by different devices and the backend carry timestamps in
//! different shapes: epoch milliseconds, RFC 3339 strings, or naive
//! date-time strings. Everything is compared as epoch milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Naive formats accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// A timestamp in any of the representations found in stored rows.
///
/// The original representation is kept as-is so that a remote value can
/// be imported verbatim; comparisons always go through [`Timestamp::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// A textual date-time (RFC 3339, naive, or numeric string).
    Text(String),
}

impl Timestamp {
    /// Converts to epoch milliseconds, or `None` if the text is unparseable.
    pub fn normalize(&self) -> Option<i64> {
        match self {
            Timestamp::Millis(ms) => Some(*ms),
            Timestamp::Text(text) => parse_millis(text),
        }
    }

    /// Converts to epoch milliseconds, treating unparseable values as the epoch.
    ///
    /// Used for last-write-wins comparison: a value that cannot be read
    /// never beats one that can.
    pub fn millis_or_zero(&self) -> i64 {
        self.normalize().unwrap_or(0)
    }

    /// Formats as RFC 3339 with millisecond precision.
    ///
    /// Unparseable text is returned unchanged.
    pub fn to_iso(&self) -> String {
        match self.normalize().and_then(format_iso) {
            Some(iso) => iso,
            None => match self {
                Timestamp::Millis(ms) => ms.to_string(),
                Timestamp::Text(text) => text.clone(),
            },
        }
    }

    /// Returns true if this timestamp is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Timestamp) -> bool {
        self.millis_or_zero() > other.millis_or_zero()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Millis(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Timestamp::Millis(ms)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Text(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl From<&str> for Timestamp {
    fn from(text: &str) -> Self {
        Timestamp::Text(text.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(text: String) -> Self {
        Timestamp::Text(text)
    }
}

/// Parses a textual timestamp into epoch milliseconds.
pub fn parse_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// Formats epoch milliseconds as RFC 3339 (`2024-01-02T03:04:05.006Z`).
pub fn format_iso(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Source of "now".
///
/// Components receive a clock instead of reading the system time directly
/// so tests can control ordering.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;

    /// Current time as a timestamp value.
    fn now(&self) -> Timestamp {
        Timestamp::Millis(self.now_millis())
    }
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock starting at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
