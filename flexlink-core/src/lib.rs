//! Reliability and scheduling primitives for flexlink devices
//!
//! Everything here is synchronous and runtime-agnostic; the async publisher
//! and scheduler in `flexlink-device` are built on top of it.
//!
//! - [`buffer`]: bounded priority buffer with per-entry leases, the outbound
//!   store behind at-least-once delivery
//! - [`traits`]: the [`Prioritizer`] seam used to score outbound messages
//! - [`span`]: half-open time spans, recurring spans and their ISO-8601 text
//! - [`time`]: clock abstraction with system and fixed sources
//!
//! ```
//! use flexlink_core::{PriorityBuffer, Span};
//!
//! let buffer = PriorityBuffer::new(100).unwrap();
//! let token = buffer.put("reading", 42, false).unwrap();
//!
//! let entry = buffer.peek_lease().unwrap();
//! assert_eq!(entry.token(), token);
//! buffer.delete(token);
//!
//! let span: Span = "2016-01-01T12:00:00.000Z/P1D".parse().unwrap();
//! assert_eq!(span.to_string(), "2016-01-01T12:00:00.000Z/P1D");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod buffer;
pub mod constants;
pub mod errors;
pub mod span;
pub mod time;
pub mod traits;

// Public API
pub use buffer::{BufferedEntry, PriorityBuffer, Token};
pub use errors::{BufferError, BufferResult, SpanError, SpanResult};
pub use span::{RecurringSpan, Span};
pub use time::{FixedTime, SystemTime, TimeSource, Timestamp};
pub use traits::{FlatPrioritizer, Prioritizer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
