//! Time Spans and Recurring Spans
//!
//! ## Overview
//!
//! A [`Span`] is the half-open interval `[start, start + length)`. A
//! [`RecurringSpan`] repeats a span every `repeat`, which is how weekly and
//! daily availability windows are expressed in schedules and recurring
//! signals.
//!
//! Both are exchanged as ISO-8601 text:
//!
//! ```text
//! span:    "2016-01-01T12:00:00.000Z/P1D"   <instant>/<duration>
//! repeat:  "P7D"                            <duration>
//! ```
//!
//! Parsing happens in three checked steps (separator, start, duration) and
//! each failure has its own [`SpanError`] variant.
//!
//! ## Usage Example
//!
//! ```rust
//! use flexlink_core::span::{RecurringSpan, Span};
//!
//! let span: Span = "2016-01-01T12:00:00.000Z/PT1H".parse().unwrap();
//! assert!(span.contains(span.start()));
//! assert!(!span.contains(span.end()));
//!
//! let weekly = RecurringSpan::parse("2016-01-01T12:00:00.000Z/PT1H", "P7D").unwrap();
//! let next = weekly.next_span(span.end()).unwrap();
//! assert_eq!(next.to_string(), "2016-01-08T12:00:00.000Z/PT1H");
//! ```

pub mod iso;
mod recurring;

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::errors::{SpanError, SpanResult};

pub use recurring::RecurringSpan;

/// Half-open time interval `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    start: DateTime<Utc>,
    length: Duration,
}

impl Span {
    /// Creates a span; `length` must be positive and `start + length` representable
    pub fn new(start: DateTime<Utc>, length: Duration) -> SpanResult<Self> {
        if length <= Duration::zero() {
            return Err(SpanError::NonPositiveLength);
        }
        if start.checked_add_signed(length).is_none() {
            return Err(SpanError::OutOfRange);
        }
        Ok(Self { start, length })
    }

    /// First instant contained in the span
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Span length, always positive
    pub fn length(&self) -> Duration {
        self.length
    }

    /// `start + length`, the first instant not contained in the span
    ///
    /// Saturates at the latest representable instant for spans moved with
    /// [`Span::starting_at`].
    pub fn end(&self) -> DateTime<Utc> {
        self.start
            .checked_add_signed(self.length)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True when `start <= at < end`
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end()
    }

    /// Same length, shifted to a new start
    pub fn starting_at(&self, start: DateTime<Utc>) -> Self {
        Self { start, length: self.length }
    }
}

impl FromStr for Span {
    type Err = SpanError;

    fn from_str(text: &str) -> SpanResult<Self> {
        let parts: Vec<&str> = text.split('/').collect();
        if parts.len() != 2 {
            return Err(SpanError::SeparatorCount { found: parts.len() - 1 });
        }

        let start = iso::parse_instant(parts[0]).map_err(|reason| SpanError::BadStart {
            input: parts[0].to_string(),
            reason,
        })?;
        let length = iso::parse_duration(parts[1]).map_err(|reason| SpanError::BadDuration {
            input: parts[1].to_string(),
            reason,
        })?;

        Span::new(start, length)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            iso::format_instant(&self.start),
            iso::format_duration(&self.length)
        )
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Span {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Span {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
