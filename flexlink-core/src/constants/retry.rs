//! Retry and Backoff Constants
//!
//! The publisher opens a backoff window after a retriable delivery status
//! (throttled, server busy, ...). Each further retriable status widens the
//! next window by a fixed step until the ceiling is reached. Any terminal
//! status resets the window to the floor.

// ===== BACKOFF WINDOW =====

/// Initial backoff window (milliseconds).
///
/// Two seconds is long enough for a throttled hub to recover its quota and
/// short enough that a single blip does not delay telemetry noticeably.
///
/// Source: message hub throttling guidance
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 2_000;

/// Amount the window grows after each consecutive retriable status (milliseconds).
pub const DEFAULT_STEP_MS: u64 = 2_000;

/// Upper bound on the backoff window (milliseconds).
///
/// One minute. Reached after 29 consecutive retriable statuses.
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 60_000;
