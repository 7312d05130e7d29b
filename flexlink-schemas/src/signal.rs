//! Signal Model
//!
//! ## Overview
//!
//! A signal is the hub telling a device what some variable should be, now and
//! in the future, for one or more entities:
//!
//! ```json
//! {
//!   "topic": "signals",
//!   "type": "oe-vars",
//!   "generated_at": "2016-07-01T00:00:00Z",
//!   "entities": ["L1", "L2"],
//!   "items": [
//!     {"start_at": "2016-07-01T00:00:00Z", "values": [{"variable": "oe-add", "value": 0.5}]},
//!     {"start_at": "2016-07-01T00:30:00Z", "value": 0.0},
//!     {"span": "2016-07-01T06:00:00.000Z/PT1H", "repeat": "P1D", "value": 1.0}
//!   ]
//! }
//! ```
//!
//! The series is piecewise constant: whatever item started most recently is in
//! force until the next one starts. Items come in three shapes that all reduce
//! to a [`SignalElement`] (a start instant plus variable/value pairs):
//!
//! - **Batch**: `{start_at, values: [{variable, value}]}`
//! - **Point**: `{start_at, value}`, one value for the signal's own type
//! - **Recurring**: `{span, repeat, value}`, effective at each occurrence start
//!
//! A value with no `variable` applies to the signal's `type`.
//!
//! ## Resolution
//!
//! - [`Signal::current_values`] at `t`: the element with the latest start
//!   `<= t` (later items win ties)
//! - [`Signal::next_change`] after `t`: the element with the earliest start
//!   `> t` (earlier items win ties)
//!
//! Recurring items use their latest occurrence at or before `t` for the
//! former and their first occurrence after `t` for the latter. `t` and every
//! item start are truncated to whole milliseconds before comparing.

use chrono::{DateTime, Duration, Utc};
use flexlink_core::span::iso;
use flexlink_core::time::truncate_millis;
use flexlink_core::{RecurringSpan, Span};
use serde::{Deserialize, Serialize};

use crate::errors::SignalError;
use crate::message::Header;

/// One variable assignment within an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalValue {
    /// Variable name; `None` means the signal's own type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub value: f64,
}

impl SignalValue {
    pub fn new(variable: impl Into<String>, value: f64) -> Self {
        Self { variable: Some(variable.into()), value }
    }

    pub fn unnamed(value: f64) -> Self {
        Self { variable: None, value }
    }
}

/// A signal item as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalItem {
    /// Several variables changing together
    Batch {
        start_at: DateTime<Utc>,
        values: Vec<SignalValue>,
    },
    /// One value for the signal's type
    Point { start_at: DateTime<Utc>, value: f64 },
    /// A value applied at every occurrence of a recurring span
    Recurring {
        span: Span,
        #[serde(with = "iso::duration_text")]
        repeat: Duration,
        value: f64,
    },
}

impl SignalItem {
    pub fn point(start_at: DateTime<Utc>, value: f64) -> Self {
        SignalItem::Point { start_at, value }
    }

    pub fn batch(start_at: DateTime<Utc>, values: Vec<SignalValue>) -> Self {
        SignalItem::Batch { start_at, values }
    }

    pub fn recurring(recurring: RecurringSpan, value: f64) -> Self {
        SignalItem::Recurring {
            span: *recurring.span(),
            repeat: recurring.repeat(),
            value,
        }
    }

    /// Values this item assigns
    pub fn values(&self) -> Vec<SignalValue> {
        match self {
            SignalItem::Batch { values, .. } => values.clone(),
            SignalItem::Point { value, .. } | SignalItem::Recurring { value, .. } => {
                vec![SignalValue::unnamed(*value)]
            }
        }
    }

    /// Start used for ordering: `start_at`, or the base span start for recurring
    /// items, in whole milliseconds
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            SignalItem::Batch { start_at, .. } | SignalItem::Point { start_at, .. } => {
                truncate_millis(*start_at)
            }
            SignalItem::Recurring { span, .. } => truncate_millis(span.start()),
        }
    }

    /// Recurring view with the base start truncated to whole milliseconds
    fn recurring_span(&self) -> Option<RecurringSpan> {
        match self {
            SignalItem::Recurring { span, repeat, .. } => {
                RecurringSpan::new(span.starting_at(truncate_millis(span.start())), *repeat).ok()
            }
            _ => None,
        }
    }

    /// Latest start of this item at or before `at`
    pub fn effective_start(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SignalItem::Recurring { .. } => self
                .recurring_span()
                .and_then(|r| r.latest_start_at_or_before(at)),
            _ => Some(self.sort_key()).filter(|start| *start <= at),
        }
    }

    /// Earliest start of this item strictly after `at`
    pub fn next_start(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SignalItem::Recurring { .. } => {
                self.recurring_span().and_then(|r| r.next_start_after(at))
            }
            _ => Some(self.sort_key()).filter(|start| *start > at),
        }
    }
}

/// Normalized view of an item: when it applies and what it sets
#[derive(Debug, Clone, PartialEq)]
pub struct SignalElement {
    pub start: DateTime<Utc>,
    pub values: Vec<SignalValue>,
}

/// A cloud-issued, time-indexed plan for one variable type on a set of entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(flatten)]
    pub header: Header,

    /// When the hub produced this signal; newer signals supersede older ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub entities: Vec<String>,

    #[serde(default)]
    pub items: Vec<SignalItem>,
}

impl Signal {
    pub fn new(kind: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            header: Header {
                kind: kind.into(),
                ..Header::default()
            },
            generated_at: Some(generated_at),
            entities: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.push(entity.into());
        self
    }

    pub fn with_item(mut self, item: SignalItem) -> Self {
        self.items.push(item);
        self
    }

    /// The signal type, e.g. `oe-add`
    pub fn kind(&self) -> &str {
        &self.header.kind
    }

    /// Checks everything needed before the signal can be scheduled
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.header.kind.is_empty() {
            return Err(SignalError::MissingType);
        }
        if self.entities.is_empty() {
            return Err(SignalError::NoEntities);
        }
        if self.generated_at.is_none() {
            return Err(SignalError::MissingGeneratedAt);
        }
        for (index, item) in self.items.iter().enumerate() {
            if let SignalItem::Recurring { span, repeat, .. } = item {
                RecurringSpan::new(*span, *repeat)
                    .map_err(|source| SignalError::Item { index, source })?;
            }
        }
        Ok(())
    }

    /// Stable sort of the items by start time
    pub fn sort_items(&mut self) {
        self.items.sort_by_key(SignalItem::sort_key);
    }

    /// Variable name a value is delivered under
    pub fn variable_for<'a>(&'a self, value: &'a SignalValue) -> &'a str {
        value.variable.as_deref().unwrap_or(&self.header.kind)
    }

    /// Values in force at `at`
    pub fn current_values(&self, at: DateTime<Utc>) -> Option<SignalElement> {
        let at = truncate_millis(at);
        let mut best: Option<(DateTime<Utc>, &SignalItem)> = None;
        for item in &self.items {
            if let Some(start) = item.effective_start(at) {
                if best.map_or(true, |(current, _)| start >= current) {
                    best = Some((start, item));
                }
            }
        }
        best.map(|(start, item)| SignalElement { start, values: item.values() })
    }

    /// The next element to take effect strictly after `at`
    pub fn next_change(&self, at: DateTime<Utc>) -> Option<SignalElement> {
        let at = truncate_millis(at);
        let mut best: Option<(DateTime<Utc>, &SignalItem)> = None;
        for item in &self.items {
            if let Some(start) = item.next_start(at) {
                if best.map_or(true, |(current, _)| start < current) {
                    best = Some((start, item));
                }
            }
        }
        best.map(|(start, item)| SignalElement { start, values: item.values() })
    }
}
