//! Time management for edge devices
//!
//! Provides a clock abstraction so scheduling and expiry logic can run
//! against the system clock in production and a fixed clock in tests.
//!
//! All instants handled by the SDK are UTC with millisecond precision.
//! Comparisons between a clock reading and a signal timestamp are always made
//! after truncating the clock reading to whole milliseconds, so an item that
//! starts "now" is never treated as being in the future because of a few
//! microseconds of clock noise.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

/// Timestamp in milliseconds since the Unix epoch (UTC)
pub type Timestamp = i64;

/// Source of time for the system
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time
    fn is_wall_clock(&self) -> bool;

    /// Current instant as a UTC date-time, truncated to milliseconds
    fn now_utc(&self) -> DateTime<Utc> {
        from_millis(self.now())
    }
}

/// Converts epoch milliseconds to a UTC date-time
///
/// Out-of-range values clamp to the epoch rather than panicking.
pub fn from_millis(ms: Timestamp) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Truncates a date-time to whole milliseconds
pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for testing
///
/// Interior-mutable so a clock shared behind an `Arc` can still be moved.
#[derive(Debug, Default)]
pub struct FixedTime {
    timestamp: AtomicI64,
}

impl FixedTime {
    /// Creates a clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp: AtomicI64::new(timestamp) }
    }

    /// Creates a clock frozen at `at`
    pub fn at(at: DateTime<Utc>) -> Self {
        Self::new(at.timestamp_millis())
    }

    /// Moves the clock to `timestamp`
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Moves the clock forward by `ms` (backward when negative)
    pub fn advance(&self, ms: i64) {
        self.timestamp.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fixed_time_advances() {
        let time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);

        time.set(42);
        assert_eq!(time.now(), 42);
    }

    #[test]
    fn now_utc_matches_millis() {
        let time = FixedTime::new(1_700_000_000_123);
        assert_eq!(time.now_utc().timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn truncation_drops_sub_millisecond_noise() {
        let base = from_millis(1_700_000_000_123);
        let noisy = base + Duration::microseconds(456);
        assert_eq!(truncate_millis(noisy), base);
    }

    #[test]
    fn system_time_is_wall_clock() {
        let clock = SystemTime;
        assert!(clock.is_wall_clock());
        assert!(clock.now() > 1_600_000_000_000);
    }
}
