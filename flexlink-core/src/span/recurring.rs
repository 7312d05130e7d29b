use chrono::{DateTime, Duration, Utc};

use super::{iso, Span};
use crate::errors::{SpanError, SpanResult};

/// A span repeated every `repeat`, starting at the base span
///
/// Occurrence `k` (for `k >= 0`) starts at `span.start + k * repeat` and has
/// the base span's length. Occurrences before the base span do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecurringSpan {
    span: Span,
    #[cfg_attr(feature = "serde", serde(with = "iso::duration_text"))]
    repeat: Duration,
}

impl RecurringSpan {
    /// Creates a recurring span; `repeat` must be positive and the first
    /// repetition must start at a representable instant
    pub fn new(span: Span, repeat: Duration) -> SpanResult<Self> {
        if repeat <= Duration::zero() {
            return Err(SpanError::NonPositiveRepeat);
        }
        if span.start().checked_add_signed(repeat).is_none() {
            return Err(SpanError::OutOfRange);
        }
        Ok(Self { span, repeat })
    }

    /// Parses the `(span, repeat)` text pair, e.g. `("2016-01-01T00:00:00.000Z/PT1H", "P7D")`
    pub fn parse(span: &str, repeat: &str) -> SpanResult<Self> {
        let span: Span = span.parse()?;
        let repeat = iso::parse_duration(repeat).map_err(|reason| SpanError::BadRepeat {
            input: repeat.to_string(),
            reason,
        })?;
        Self::new(span, repeat)
    }

    /// The base occurrence
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Distance between consecutive occurrence starts
    pub fn repeat(&self) -> Duration {
        self.repeat
    }

    /// Repeat period as ISO-8601 text
    pub fn repeat_text(&self) -> String {
        iso::format_duration(&self.repeat)
    }

    fn repeat_ms(&self) -> i64 {
        self.repeat.num_milliseconds().max(1)
    }

    /// Start of occurrence `index`, `None` past the end of the time range
    fn occurrence(&self, index: i64) -> Option<DateTime<Utc>> {
        let offset = Duration::try_milliseconds(index.checked_mul(self.repeat_ms())?)?;
        self.span.start().checked_add_signed(offset)
    }

    /// Whole repeats between the base start and `at`, which must not precede it
    fn repeats_elapsed(&self, at: DateTime<Utc>) -> i64 {
        (at - self.span.start()).num_milliseconds() / self.repeat_ms()
    }

    /// The first occurrence that contains `now` or starts after it
    ///
    /// Equivalent to stepping the base span forward by `repeat` until it
    /// either contains `now` or lies entirely in the future, computed
    /// directly so a years-old base span costs nothing extra. `None` when
    /// that occurrence would start past the end of the time range.
    pub fn next_span(&self, now: DateTime<Utc>) -> Option<Span> {
        // An occurrence qualifies once its end is after `now`.
        let past_end = now - self.span.end();
        let index = if past_end < Duration::zero() {
            0
        } else {
            past_end.num_milliseconds() / self.repeat_ms() + 1
        };
        self.occurrence(index).map(|start| self.span.starting_at(start))
    }

    /// Start of the most recent occurrence at or before `at`, if any
    pub fn latest_start_at_or_before(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if at < self.span.start() {
            return None;
        }
        self.occurrence(self.repeats_elapsed(at))
    }

    /// Start of the first occurrence strictly after `at`, if representable
    pub fn next_start_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if at < self.span.start() {
            return Some(self.span.start());
        }
        self.occurrence(self.repeats_elapsed(at).checked_add(1)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 1, 8, 0, 0).unwrap()
    }

    fn recurring(length: Duration, repeat: Duration) -> RecurringSpan {
        RecurringSpan::new(Span::new(base(), length).unwrap(), repeat).unwrap()
    }

    #[test]
    fn next_span_skips_to_following_occurrence() {
        // now = t0 + 2m falls between occurrences
        let r = recurring(Duration::minutes(1), Duration::minutes(4));
        let next = r.next_span(base() + Duration::minutes(2)).unwrap();
        assert_eq!(next.start(), base() + Duration::minutes(4));
        assert_eq!(next.length(), Duration::minutes(1));
    }

    #[test]
    fn next_span_returns_containing_occurrence() {
        let r = recurring(Duration::minutes(1), Duration::minutes(1));
        let next = r.next_span(base() + Duration::minutes(2)).unwrap();
        assert_eq!(next.start(), base() + Duration::minutes(2));
    }

    #[test]
    fn next_span_before_base_is_base() {
        let r = recurring(Duration::minutes(1), Duration::minutes(4));
        assert_eq!(r.next_span(base() - Duration::days(3)).unwrap().start(), base());
    }

    #[test]
    fn next_span_prefers_earliest_overlapping_occurrence() {
        // length longer than repeat: several occurrences overlap `now`
        let r = recurring(Duration::minutes(10), Duration::minutes(3));
        let next = r.next_span(base() + Duration::minutes(11)).unwrap();
        assert_eq!(next.start(), base() + Duration::minutes(3));
        assert!(next.contains(base() + Duration::minutes(11)));
    }

    #[test]
    fn occurrence_lookup() {
        let r = recurring(Duration::minutes(1), Duration::minutes(5));
        assert_eq!(r.latest_start_at_or_before(base() - Duration::seconds(1)), None);
        assert_eq!(r.latest_start_at_or_before(base()), Some(base()));
        assert_eq!(
            r.latest_start_at_or_before(base() + Duration::minutes(12)),
            Some(base() + Duration::minutes(10))
        );
        assert_eq!(r.next_start_after(base()), Some(base() + Duration::minutes(5)));
        assert_eq!(r.next_start_after(base() - Duration::minutes(1)), Some(base()));
        assert_eq!(
            r.next_start_after(base() + Duration::minutes(10)),
            Some(base() + Duration::minutes(15))
        );
    }

    #[test]
    fn sub_millisecond_offsets_round_the_right_way() {
        let r = recurring(Duration::minutes(1), Duration::minutes(5));
        let just_before = |at: DateTime<Utc>| at - Duration::microseconds(400);

        // still inside the base occurrence
        let end = base() + Duration::minutes(1);
        assert_eq!(r.next_span(just_before(end)).unwrap().start(), base());
        // the base has not started yet
        assert_eq!(r.latest_start_at_or_before(just_before(base())), None);
        assert_eq!(r.next_start_after(just_before(base())), Some(base()));
        // just past the end moves on
        let after_end = end + Duration::microseconds(400);
        assert_eq!(
            r.next_span(after_end).unwrap().start(),
            base() + Duration::minutes(5)
        );
    }

    #[test]
    fn repeat_past_the_end_of_time_is_rejected() {
        let err = RecurringSpan::parse("2016-01-01T00:00:00.000Z/PT1H", "P99999999D").unwrap_err();
        assert_eq!(err, SpanError::OutOfRange);
    }

    #[test]
    fn occurrences_beyond_the_time_range_are_none() {
        let start = DateTime::<Utc>::MAX_UTC - Duration::days(10);
        let r = RecurringSpan::new(Span::new(start, Duration::hours(1)).unwrap(), Duration::days(7))
            .unwrap();
        let late = start + Duration::days(8);
        assert_eq!(r.latest_start_at_or_before(late), Some(start + Duration::days(7)));
        assert_eq!(r.next_start_after(late), None);
        assert_eq!(r.next_span(late), None);
    }

    #[test]
    fn parse_pair() {
        let r = RecurringSpan::parse("2016-01-01T12:00:00.000Z/PT1H", "P7D").unwrap();
        assert_eq!(r.repeat(), Duration::days(7));
        assert_eq!(r.repeat_text(), "P7D");
        assert_eq!(r.span().to_string(), "2016-01-01T12:00:00.000Z/PT1H");
    }

    #[test]
    fn parse_pair_errors() {
        let err = RecurringSpan::parse("2016-01-01T12:00:00.000Z/PT1H", "weekly").unwrap_err();
        assert_eq!(err.as_label(), "span_bad_repeat");

        let err = RecurringSpan::parse("2016-01-01T12:00:00.000Z/PT1H", "-P1D").unwrap_err();
        assert_eq!(err, SpanError::NonPositiveRepeat);

        let err = RecurringSpan::parse("2016-01-01T12:00:00.000Z", "P1D").unwrap_err();
        assert_eq!(err, SpanError::SeparatorCount { found: 0 });
    }
}
