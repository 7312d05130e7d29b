//! Constants for flexlink Core
//!
//! Centralized defaults used by the buffer, the publisher's retry loop and
//! the signal scheduler. Runtime configuration structs in `flexlink-device`
//! take their `Default` values from here.
//!
//! ## Organization
//!
//! Constants are grouped by domain:
//! - **Buffers**: capacity of the outbound message buffer
//! - **Retry**: backoff window floor, step and ceiling
//! - **Time**: unit conversions, polling and scheduling granularity
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units

/// Buffer sizes for the outbound message buffer.
pub mod buffers;

/// Backoff parameters for transient delivery failures.
pub mod retry;

/// Time unit conversions, polling intervals and scheduler granularity.
pub mod time;

pub use buffers::DEFAULT_BUFFER_CAPACITY;

pub use retry::{DEFAULT_MAX_INTERVAL_MS, DEFAULT_MIN_INTERVAL_MS, DEFAULT_STEP_MS};

pub use time::{
    DEFAULT_DELAY_GRANULARITY_MS, DEFAULT_IDLE_POLL_MS, DEFAULT_SCHEDULER_WORKERS, MS_PER_SECOND,
};
