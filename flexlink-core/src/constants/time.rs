//! Time-Related Constants
//!
//! Time unit conversions plus the polling and scheduling intervals used by
//! the drain loop and the signal scheduler.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: i64 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: i64 = 3600;

/// Seconds per day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Days per week, used by ISO-8601 `W` durations.
pub const DAYS_PER_WEEK: i64 = 7;

// ===== POLLING =====

/// Drain loop sleep when the buffer has nothing to lease (milliseconds).
///
/// An idle device should not spin. One second keeps latency acceptable for
/// messages that were buffered while a previous send was in flight.
pub const DEFAULT_IDLE_POLL_MS: u64 = 1_000;

// ===== SCHEDULING =====

/// Delays computed by the signal scheduler are rounded up to a multiple of
/// this granularity (milliseconds).
///
/// Prevents arming timers for sub-granularity delays that would fire
/// immediately and thrash the timer wheel.
pub const DEFAULT_DELAY_GRANULARITY_MS: u64 = 10;

/// Number of concurrent workers running signal callbacks.
pub const DEFAULT_SCHEDULER_WORKERS: usize = 5;
