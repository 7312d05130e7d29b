//! Wire Messages
//!
//! ## Overview
//!
//! Every message exchanged with the hub is a JSON object with a `topic`
//! discriminator and a common header:
//!
//! ```json
//! {
//!   "topic": "readings",
//!   "entity": "L1",
//!   "type": "power",
//!   "timestamp": 1467331200000,
//!   "value": 12.5
//! }
//! ```
//!
//! | topic              | Rust type                      | body                                  |
//! |--------------------|--------------------------------|---------------------------------------|
//! | `readings`         | [`Reading`]                    | `value` (number)                      |
//! | `events`           | [`Event`]                      | `level` (0-3), `value` (text)         |
//! | `schedules`        | [`Schedule`]                   | `schedule: [{span, repeat, value}]`   |
//! | `signals`          | [`Signal`]                     | `generated_at`, `entities`, `items`   |
//! | `schedule-signals` | [`Signal`] (recurring items)   | as above, items `{span, repeat, value}` |
//!
//! Field names are snake_case. The optional envelope fields `devicecode` and
//! `provenance` are omitted when unset. `timestamp` is milliseconds since the
//! Unix epoch; a message encoded without one is stamped with the current time.

use chrono::Duration;
use flexlink_core::span::iso;
use flexlink_core::{RecurringSpan, Span, SpanResult, SystemTime, TimeSource, Timestamp};
use serde::{Deserialize, Serialize};

use crate::errors::{SchemaError, SchemaResult};
use crate::signal::Signal;

/// Well-known `type` values
pub mod types {
    // ===== READINGS =====

    /// Active power (kW)
    pub const POWER: &str = "power";
    /// Upward frequency-response availability
    pub const AVAILABILITY_FFR_HIGH: &str = "availability-ffr-high";
    /// Downward frequency-response availability
    pub const AVAILABILITY_FFR_LOW: &str = "availability-ffr-low";
    /// Upward frequency-response delivered
    pub const RESPONSE_FFR_HIGH: &str = "response-ffr-high";
    /// Downward frequency-response delivered
    pub const RESPONSE_FFR_LOW: &str = "response-ffr-low";
    pub const CONTROL_VARIABLE: &str = "control-variable";
    pub const SETPOINT: &str = "setpoint";
    pub const SETPOINT_HIGH: &str = "setpoint-high";
    pub const SETPOINT_LOW: &str = "setpoint-low";

    // ===== EVENTS =====

    /// Frequency-response switching began
    pub const SWITCH_FFR_START: &str = "switch-ffr-start";
    /// Frequency-response switching ended
    pub const SWITCH_FFR_END: &str = "switch-ffr-end";

    // ===== SIGNALS =====

    /// Additive offset applied to an entity's operating point
    pub const OE_ADD: &str = "oe-add";
    /// Multiplicative factor applied to an entity's operating point
    pub const OE_MULTIPLY: &str = "oe-multiply";
    /// Batch signal carrying several named variables
    pub const OE_VARS: &str = "oe-vars";
}

/// Topic strings
pub mod topics {
    pub const READINGS: &str = "readings";
    pub const EVENTS: &str = "events";
    pub const SCHEDULES: &str = "schedules";
    pub const SIGNALS: &str = "signals";
    pub const SCHEDULE_SIGNALS: &str = "schedule-signals";

    /// Every topic [`Message`](super::Message) can decode
    pub const ALL: [&str; 5] = [READINGS, EVENTS, SCHEDULES, SIGNALS, SCHEDULE_SIGNALS];
}

/// Fields shared by every message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Target or source entity code; signals use `entities` instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Message type, e.g. `power` or `oe-add`
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,

    /// Device that produced the message
    #[serde(rename = "devicecode", default, skip_serializing_if = "Option::is_none")]
    pub device_code: Option<String>,

    /// Origin of the data when relayed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl Header {
    pub fn new(entity: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_device_code(mut self, code: impl Into<String>) -> Self {
        self.device_code = Some(code.into());
        self
    }

    pub fn with_provenance(mut self, provenance: impl Into<String>) -> Self {
        self.provenance = Some(provenance.into());
        self
    }

    fn validate(&self) -> SchemaResult<()> {
        if self.kind.is_empty() {
            return Err(SchemaError::MissingType);
        }
        if self.entity.as_deref().map_or(true, str::is_empty) {
            return Err(SchemaError::MissingEntity);
        }
        Ok(())
    }
}

/// A numeric measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(flatten)]
    pub header: Header,
    pub value: f64,
}

impl Reading {
    pub fn new(entity: impl Into<String>, kind: impl Into<String>, value: f64) -> Self {
        Self { header: Header::new(entity, kind), value }
    }
}

/// Event severity, encoded as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    /// Debug and info events are diagnostics, not operational signals
    pub fn is_diagnostic(self) -> bool {
        matches!(self, Level::Debug | Level::Info)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Level::Debug),
            1 => Ok(Level::Info),
            2 => Ok(Level::Warn),
            3 => Ok(Level::Error),
            other => Err(format!("event level must be 0-3, got {other}")),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level as u8
    }
}

/// Something that happened on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub header: Header,
    pub level: Level,
    #[serde(default)]
    pub value: String,
}

impl Event {
    pub fn new(entity: impl Into<String>, kind: impl Into<String>, level: Level) -> Self {
        Self {
            header: Header::new(entity, kind),
            level,
            value: String::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// One recurring window of a [`Schedule`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub span: Span,
    #[serde(with = "iso::duration_text")]
    pub repeat: Duration,
    pub value: String,
}

impl ScheduleItem {
    pub fn new(recurring: RecurringSpan, value: impl Into<String>) -> Self {
        Self {
            span: *recurring.span(),
            repeat: recurring.repeat(),
            value: value.into(),
        }
    }

    /// The window as a validated recurring span
    pub fn recurring(&self) -> SpanResult<RecurringSpan> {
        RecurringSpan::new(self.span, self.repeat)
    }
}

/// A device's declared recurring availability or operating plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
}

impl Schedule {
    pub fn new(entity: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            header: Header::new(entity, kind),
            schedule: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: ScheduleItem) -> Self {
        self.schedule.push(item);
        self
    }
}

/// Any message, discriminated by `topic`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum Message {
    #[serde(rename = "readings")]
    Reading(Reading),
    #[serde(rename = "events")]
    Event(Event),
    #[serde(rename = "schedules")]
    Schedule(Schedule),
    #[serde(rename = "signals")]
    Signal(Signal),
    #[serde(rename = "schedule-signals")]
    ScheduleSignal(Signal),
}

impl Message {
    /// Decodes a message, dispatching on its `topic`
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let topic = value
            .get("topic")
            .and_then(serde_json::Value::as_str)
            .ok_or(SchemaError::MissingTopic)?;
        if !topics::ALL.contains(&topic) {
            log::warn!("dropping message with unknown topic {topic:?}");
            return Err(SchemaError::UnknownTopic(topic.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Encodes the message, stamping a missing timestamp with the system clock
    pub fn to_json(&self) -> SchemaResult<String> {
        self.to_json_at(&SystemTime)
    }

    /// Encodes the message, stamping a missing timestamp from `clock`
    pub fn to_json_at(&self, clock: &dyn TimeSource) -> SchemaResult<String> {
        if self.header().timestamp.is_some() {
            return Ok(serde_json::to_string(self)?);
        }
        let mut stamped = self.clone();
        stamped.header_mut().timestamp = Some(clock.now());
        Ok(serde_json::to_string(&stamped)?)
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Message::Reading(_) => topics::READINGS,
            Message::Event(_) => topics::EVENTS,
            Message::Schedule(_) => topics::SCHEDULES,
            Message::Signal(_) => topics::SIGNALS,
            Message::ScheduleSignal(_) => topics::SCHEDULE_SIGNALS,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Message::Reading(m) => &m.header,
            Message::Event(m) => &m.header,
            Message::Schedule(m) => &m.header,
            Message::Signal(s) | Message::ScheduleSignal(s) => &s.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Message::Reading(m) => &mut m.header,
            Message::Event(m) => &mut m.header,
            Message::Schedule(m) => &mut m.header,
            Message::Signal(s) | Message::ScheduleSignal(s) => &mut s.header,
        }
    }

    pub fn kind(&self) -> &str {
        &self.header().kind
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.header().timestamp
    }

    /// Sets the timestamp if none is present
    pub fn stamp(&mut self, now: Timestamp) {
        self.header_mut().timestamp.get_or_insert(now);
    }

    /// Rejects messages with an empty type or target
    ///
    /// Signals are checked with [`Signal::validate`] instead, since they
    /// address a list of entities rather than one.
    pub fn validate(&self) -> SchemaResult<()> {
        match self {
            Message::Signal(signal) | Message::ScheduleSignal(signal) => {
                signal.validate().map_err(SchemaError::from)
            }
            other => other.header().validate(),
        }
    }

    /// The signal carried by a `signals` or `schedule-signals` message
    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Message::Signal(s) | Message::ScheduleSignal(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Reading> for Message {
    fn from(reading: Reading) -> Self {
        Message::Reading(reading)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

impl From<Schedule> for Message {
    fn from(schedule: Schedule) -> Self {
        Message::Schedule(schedule)
    }
}
