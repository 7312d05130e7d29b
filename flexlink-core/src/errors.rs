//! Error Types for Buffering and Time-Span Handling
//!
//! ## Design Philosophy
//!
//! Errors in the core crate are raised at the boundary where bad input or a
//! capacity limit is first observed, and are returned to the immediate caller:
//!
//! 1. **Never silent**: a message that cannot be buffered is reported as
//!    [`BufferError::Full`]; the buffer never drops data without telling anyone.
//!
//! 2. **Expected vs. fatal**: [`BufferError::NotFound`] is part of normal
//!    operation (an idle drain loop sees it constantly) and callers are expected
//!    to match on it rather than log it.
//!
//! 3. **Descriptive parse failures**: span text is parsed in three steps
//!    (separator, start, duration) and each step has its own variant so a bad
//!    signal payload can be diagnosed from the error alone.
//!
//! ## Error Categories
//!
//! ### Buffer
//! - `Full`: capacity reached and the new priority does not beat the minimum
//! - `NotFound`: no leasable entry, or an unknown token
//! - `ZeroCapacity`: a buffer must hold at least one entry
//!
//! ### Spans
//! - `SeparatorCount`: `start/duration` did not contain exactly one `/`
//! - `BadStart` / `BadDuration` / `BadRepeat`: a component failed to parse
//! - `NonPositiveRepeat` / `NonPositiveLength`: arithmetic would not terminate
//! - `OutOfRange`: the span end or first repeat is not a representable instant
//!
//! ## Handling Strategy
//!
//! ```rust
//! use flexlink_core::{BufferError, PriorityBuffer};
//!
//! let buffer = PriorityBuffer::new(1).unwrap();
//! buffer.put("keep", 10, false).unwrap();
//!
//! match buffer.put("shed", 5, false) {
//!     Ok(_) => {}
//!     Err(BufferError::Full { .. }) => {
//!         // caller decides: drop, shed load or retry later
//!     }
//!     Err(e) => panic!("unexpected: {e}"),
//! }
//! ```

use thiserror_no_std::Error;

use crate::buffer::Token;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Result type for span parsing and arithmetic
pub type SpanResult<T> = Result<T, SpanError>;

/// Errors raised by [`PriorityBuffer`](crate::buffer::PriorityBuffer)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Buffer is at capacity and the new entry is not important enough to evict anything
    #[error("buffer full ({capacity} entries): priority {priority} does not exceed minimum {minimum}")]
    Full {
        /// Configured capacity
        capacity: usize,
        /// Priority of the rejected entry
        priority: i64,
        /// Lowest priority currently held
        minimum: i64,
    },

    /// No entry matched: either the token is unknown or every entry is leased
    #[error("no matching entry{}", match .token { Some(t) => format!(" for token {t}"), None => String::new() })]
    NotFound {
        /// Token that was looked up, `None` for a lease scan
        token: Option<Token>,
    },

    /// A buffer must be able to hold at least one entry
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
}

impl BufferError {
    /// Returns a short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            BufferError::Full { .. } => "buffer_full",
            BufferError::NotFound { .. } => "buffer_not_found",
            BufferError::ZeroCapacity => "buffer_zero_capacity",
        }
    }

    /// True for the "nothing to lease / unknown token" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, BufferError::NotFound { .. })
    }
}

/// Errors raised while parsing or constructing spans
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanError {
    /// Interval text must be `<start>/<duration>`
    #[error("expected exactly one '/' in span, found {found}")]
    SeparatorCount {
        /// Number of separators actually present
        found: usize,
    },

    /// Start instant could not be parsed
    #[error("invalid span start {input:?}: {reason}")]
    BadStart {
        /// Offending text
        input: String,
        /// Parser message
        reason: String,
    },

    /// Span length could not be parsed
    #[error("invalid span duration {input:?}: {reason}")]
    BadDuration {
        /// Offending text
        input: String,
        /// Parser message
        reason: &'static str,
    },

    /// Repeat period could not be parsed
    #[error("invalid repeat {input:?}: {reason}")]
    BadRepeat {
        /// Offending text
        input: String,
        /// Parser message
        reason: &'static str,
    },

    /// Repeat period must be strictly positive
    #[error("repeat period must be positive")]
    NonPositiveRepeat,

    /// Span length must be strictly positive
    #[error("span length must be positive")]
    NonPositiveLength,

    /// Start plus length (or plus one repeat) falls outside the supported time range
    #[error("span arithmetic leaves the representable time range")]
    OutOfRange,
}

impl SpanError {
    /// Returns a short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            SpanError::SeparatorCount { .. } => "span_separator_count",
            SpanError::BadStart { .. } => "span_bad_start",
            SpanError::BadDuration { .. } => "span_bad_duration",
            SpanError::BadRepeat { .. } => "span_bad_repeat",
            SpanError::NonPositiveRepeat => "span_non_positive_repeat",
            SpanError::NonPositiveLength => "span_non_positive_length",
            SpanError::OutOfRange => "span_out_of_range",
        }
    }
}
