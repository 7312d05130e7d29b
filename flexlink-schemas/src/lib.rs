//! Wire Messages and the Signal Model
//!
//! ## Overview
//!
//! This crate defines what travels between a flexlink device and the hub:
//!
//! - [`message`]: the `topic`-tagged JSON messages (readings, events,
//!   schedules, signals) and the well-known type names
//! - [`signal`]: signals as piecewise-constant time series, with the
//!   current/next resolution the scheduler runs on
//! - [`priority`]: the reference [`FfrPrioritizer`] used to order the
//!   outbound buffer
//!
//! ## Why JSON?
//!
//! The hub speaks JSON over its device channel, and signals are short and
//! rare enough that a binary encoding buys nothing. Decoding goes through
//! `serde_json` with one Rust type per topic.
//!
//! ## Usage Example
//!
//! ```rust
//! use flexlink_schemas::{Message, SignalItem};
//!
//! let json = r#"{
//!     "topic": "signals",
//!     "type": "oe-add",
//!     "generated_at": "2016-07-01T00:00:00Z",
//!     "entities": ["L1"],
//!     "items": [{"start_at": "2016-07-01T00:00:00Z", "value": 0.5}]
//! }"#;
//!
//! let signal = Message::from_json(json)?.into_signal().unwrap();
//! signal.validate()?;
//! assert!(matches!(signal.items[0], SignalItem::Point { value, .. } if value == 0.5));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod errors;
pub mod message;
pub mod priority;
pub mod signal;

pub use errors::{SchemaError, SchemaResult, SignalError};
pub use message::{topics, types, Event, Header, Level, Message, Reading, Schedule, ScheduleItem};
pub use priority::FfrPrioritizer;
pub use signal::{Signal, SignalElement, SignalItem, SignalValue};
