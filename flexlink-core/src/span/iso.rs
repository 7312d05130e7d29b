//! ISO-8601 text notation for instants and durations
//!
//! Instants are written `yyyy-MM-ddTHH:mm:ss.SSSZ` (always UTC, always
//! millisecond precision). RFC 3339 text with an explicit offset is accepted
//! on input and normalized to UTC.
//!
//! Durations follow the `PnWnDTnHnMn.nS` subset of ISO-8601 that has a fixed
//! length: weeks, days (24h), hours, minutes and fractional seconds. Years and
//! months are rejected because their length depends on the calendar. A single
//! leading `-` negates the whole duration.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::constants::time::{
    DAYS_PER_WEEK, MS_PER_SECOND, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE,
};

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Parses an instant, returning the chrono error text on failure
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>, String> {
    match NaiveDateTime::parse_from_str(text, INSTANT_FORMAT) {
        Ok(naive) => Ok(naive.and_utc()),
        Err(strict) => DateTime::parse_from_rfc3339(text)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| strict.to_string()),
    }
}

/// Formats an instant as `yyyy-MM-ddTHH:mm:ss.SSSZ`
pub fn format_instant(at: &DateTime<Utc>) -> String {
    at.format(INSTANT_FORMAT).to_string()
}

/// Parses a fixed-length ISO-8601 duration such as `P1D`, `PT15M` or `PT0.5S`
pub fn parse_duration(text: &str) -> Result<Duration, &'static str> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest
        .strip_prefix('P')
        .or_else(|| rest.strip_prefix('p'))
        .ok_or("duration must start with 'P'")?;
    if rest.is_empty() {
        return Err("duration has no components");
    }

    let mut total_ms: i64 = 0;
    let mut in_time = false;
    let mut seen_component = false;
    let mut number = String::new();

    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            'T' => {
                if in_time || !number.is_empty() {
                    return Err("misplaced 'T' designator");
                }
                in_time = true;
            }
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            unit => {
                if number.is_empty() {
                    return Err("designator without a number");
                }
                let ms = component_ms(&number, unit, in_time)?;
                total_ms = total_ms.checked_add(ms).ok_or("duration overflows")?;
                number.clear();
                seen_component = true;
            }
        }
    }

    if !number.is_empty() {
        return Err("number without a designator");
    }
    if !seen_component {
        return Err("duration has no components");
    }

    let total_ms = if negative { -total_ms } else { total_ms };
    Duration::try_milliseconds(total_ms).ok_or("duration out of range")
}

fn component_ms(number: &str, unit: char, in_time: bool) -> Result<i64, &'static str> {
    let seconds_per_unit = match (unit, in_time) {
        ('W', false) => DAYS_PER_WEEK * SECONDS_PER_DAY,
        ('D', false) => SECONDS_PER_DAY,
        ('H', true) => SECONDS_PER_HOUR,
        ('M', true) => SECONDS_PER_MINUTE,
        ('S', true) => 1,
        ('Y', false) | ('M', false) => return Err("years and months have no fixed length"),
        _ => return Err("unknown or misplaced designator"),
    };

    if let Some((whole, fraction)) = number.split_once('.') {
        if unit != 'S' {
            return Err("only seconds may have a fraction");
        }
        let whole: i64 = parse_digits(whole)?;
        let mut fraction_ms = 0i64;
        let mut scale = 100;
        for digit in fraction.chars() {
            let d = digit.to_digit(10).ok_or("invalid fraction")? as i64;
            fraction_ms += d * scale;
            scale /= 10;
        }
        return whole
            .checked_mul(MS_PER_SECOND)
            .and_then(|ms| ms.checked_add(fraction_ms))
            .ok_or("duration overflows");
    }

    parse_digits(number)?
        .checked_mul(seconds_per_unit * MS_PER_SECOND)
        .ok_or("duration overflows")
}

fn parse_digits(digits: &str) -> Result<i64, &'static str> {
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<i64>().map_err(|_| "invalid number")
}

/// Formats a duration in canonical ISO-8601 form
///
/// Whole days are written with `D`; the remainder uses `H`, `M` and `S` with
/// millisecond precision. Zero is `PT0S`.
pub fn format_duration(duration: &Duration) -> String {
    let total_ms = duration.num_milliseconds();
    if total_ms == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::new();
    if total_ms < 0 {
        out.push('-');
    }
    out.push('P');

    let mut ms = total_ms.unsigned_abs();
    let day_ms = (SECONDS_PER_DAY * MS_PER_SECOND) as u64;
    let hour_ms = (SECONDS_PER_HOUR * MS_PER_SECOND) as u64;
    let minute_ms = (SECONDS_PER_MINUTE * MS_PER_SECOND) as u64;

    let days = ms / day_ms;
    ms %= day_ms;
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if ms == 0 {
        return out;
    }

    out.push('T');
    let hours = ms / hour_ms;
    ms %= hour_ms;
    let minutes = ms / minute_ms;
    ms %= minute_ms;
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if ms > 0 {
        let seconds = ms / 1000;
        let millis = ms % 1000;
        if millis == 0 {
            out.push_str(&format!("{seconds}S"));
        } else {
            let fraction = format!("{millis:03}");
            out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
        }
    }
    out
}

/// `#[serde(with = "...")]` adapter storing a [`Duration`] as ISO-8601 text
#[cfg(feature = "serde")]
pub mod duration_text {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes the duration as ISO-8601 text
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(duration))
    }

    /// Reads ISO-8601 duration text
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        super::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_common_durations() {
        assert_eq!(parse_duration("P1D").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("PT1M").unwrap(), Duration::minutes(1));
        assert_eq!(parse_duration("PT1H30M").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("P7D").unwrap(), Duration::weeks(1));
        assert_eq!(parse_duration("P1W").unwrap(), Duration::weeks(1));
        assert_eq!(parse_duration("PT0.5S").unwrap(), Duration::milliseconds(500));
        assert_eq!(parse_duration("P1DT2H").unwrap(), Duration::hours(26));
        assert_eq!(parse_duration("-PT5S").unwrap(), Duration::seconds(-5));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1D").is_err());
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("P1M").is_err());
        assert!(parse_duration("P1Y").is_err());
        assert!(parse_duration("PT1").is_err());
        assert!(parse_duration("P1H").is_err());
        assert!(parse_duration("PT1.5M").is_err());
        assert!(parse_duration("PTXS").is_err());
    }

    #[test]
    fn formats_canonically() {
        assert_eq!(format_duration(&Duration::days(1)), "P1D");
        assert_eq!(format_duration(&Duration::minutes(90)), "PT1H30M");
        assert_eq!(format_duration(&Duration::milliseconds(1500)), "PT1.5S");
        assert_eq!(format_duration(&Duration::milliseconds(1005)), "PT1.005S");
        assert_eq!(format_duration(&Duration::zero()), "PT0S");
        assert_eq!(format_duration(&(Duration::days(2) + Duration::seconds(3))), "P2DT3S");
        assert_eq!(format_duration(&Duration::seconds(-60)), "-PT1M");
    }

    #[test]
    fn instant_round_trip() {
        let at = parse_instant("2016-01-01T12:00:00.000Z").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2016, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(format_instant(&at), "2016-01-01T12:00:00.000Z");
    }

    #[test]
    fn instant_accepts_offsets() {
        let at = parse_instant("2016-01-01T13:00:00+01:00").unwrap();
        assert_eq!(format_instant(&at), "2016-01-01T12:00:00.000Z");
        assert!(parse_instant("2016-01-01").is_err());
        assert!(parse_instant("yesterday").is_err());
    }
}
