//! Runtime configuration
//!
//! Every struct has a `Default` built from `flexlink_core::constants`, chainable
//! setters, and a JSON form where durations are whole milliseconds:
//!
//! ```rust
//! use flexlink_device::PublisherConfig;
//!
//! let config: PublisherConfig = serde_json::from_str(
//!     r#"{ "capacity": 500, "retry": { "max_interval_ms": 30000 } }"#,
//! )?;
//! assert_eq!(config.capacity, 500);
//! assert_eq!(config.retry.max_interval.as_secs(), 30);
//! assert_eq!(config.retry.min_interval.as_secs(), 2);
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::time::Duration;

use flexlink_core::constants::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_DELAY_GRANULARITY_MS, DEFAULT_IDLE_POLL_MS,
    DEFAULT_MAX_INTERVAL_MS, DEFAULT_MIN_INTERVAL_MS, DEFAULT_SCHEDULER_WORKERS, DEFAULT_STEP_MS,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Backoff window parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First window opened after a retriable status, and the value a terminal status resets to.
    #[serde(rename = "min_interval_ms", with = "millis")]
    pub min_interval: Duration,
    /// Growth per consecutive retriable status.
    #[serde(rename = "step_ms", with = "millis")]
    pub step: Duration,
    /// Ceiling.
    #[serde(rename = "max_interval_ms", with = "millis")]
    pub max_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            step: Duration::from_millis(DEFAULT_STEP_MS),
            max_interval: Duration::from_millis(DEFAULT_MAX_INTERVAL_MS),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Requires `0 < min_interval <= max_interval` and a non-zero step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_interval.is_zero() {
            return Err(ConfigError::new("retry.min_interval", "must be positive"));
        }
        if self.step.is_zero() {
            return Err(ConfigError::new("retry.step", "must be positive"));
        }
        if self.max_interval < self.min_interval {
            return Err(ConfigError::new("retry.max_interval", "must not be below min_interval"));
        }
        Ok(())
    }
}

/// Reliable publisher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Maximum number of buffered messages.
    pub capacity: usize,
    /// Backoff parameters.
    pub retry: RetryConfig,
    /// Drain loop sleep when nothing is leasable.
    #[serde(rename = "idle_poll_ms", with = "millis")]
    pub idle_poll: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            retry: RetryConfig::default(),
            idle_poll: Duration::from_millis(DEFAULT_IDLE_POLL_MS),
        }
    }
}

impl PublisherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set backoff parameters
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set idle poll interval
    pub fn idle_poll(mut self, interval: Duration) -> Self {
        self.idle_poll = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("capacity", "must be at least 1"));
        }
        if self.idle_poll.is_zero() {
            return Err(ConfigError::new("idle_poll", "must be positive"));
        }
        self.retry.validate()
    }
}

/// Signal scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Callback workers that may run at once; further work runs on the timer task.
    pub workers: usize,
    /// Timer delays are rounded up to a multiple of this.
    #[serde(rename = "delay_granularity_ms", with = "millis")]
    pub delay_granularity: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_SCHEDULER_WORKERS,
            delay_granularity: Duration::from_millis(DEFAULT_DELAY_GRANULARITY_MS),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn delay_granularity(mut self, granularity: Duration) -> Self {
        self.delay_granularity = granularity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::new("workers", "must be at least 1"));
        }
        if self.delay_granularity.is_zero() {
            return Err(ConfigError::new("delay_granularity", "must be positive"));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
