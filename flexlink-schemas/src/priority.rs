//! Frequency-response aware message prioritization
//!
//! Every message starts with a score equal to its timestamp, so newer data
//! goes first and older data is evicted first. On top of that:
//!
//! | message                                              | score          |
//! |------------------------------------------------------|----------------|
//! | reading: power, availability-ffr-high/low, response-ffr-high | `ts * 2` |
//! | event: switch-ffr-start, switch-ffr-end              | `ts * 2`       |
//! | other event at debug or info level                   | `ts / 2`       |
//! | anything else                                        | `ts`           |
//!
//! A message without a timestamp scores as if stamped at the epoch.

use flexlink_core::Prioritizer;

use crate::message::{types, Message};

/// Reading types that carry frequency-response critical data
pub const CRITICAL_READINGS: [&str; 4] = [
    types::POWER,
    types::AVAILABILITY_FFR_HIGH,
    types::AVAILABILITY_FFR_LOW,
    types::RESPONSE_FFR_HIGH,
];

/// Event types that mark frequency-response switching
pub const CRITICAL_EVENTS: [&str; 2] = [types::SWITCH_FFR_START, types::SWITCH_FFR_END];

/// Reference prioritizer for frequency-response devices
#[derive(Debug, Clone, Copy, Default)]
pub struct FfrPrioritizer;

impl Prioritizer<Message> for FfrPrioritizer {
    fn score(&self, message: &Message) -> i64 {
        let ts = message.timestamp().unwrap_or_default();
        match message {
            Message::Reading(reading) if CRITICAL_READINGS.contains(&reading.header.kind.as_str()) => {
                ts.saturating_mul(2)
            }
            Message::Event(event) if CRITICAL_EVENTS.contains(&event.header.kind.as_str()) => {
                ts.saturating_mul(2)
            }
            Message::Event(event) if event.level.is_diagnostic() => ts / 2,
            _ => ts,
        }
    }
}
