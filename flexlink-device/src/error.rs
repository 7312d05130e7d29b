//! Error types for the device runtime.

use flexlink_core::BufferError;
use flexlink_schemas::{SchemaError, SignalError};
use thiserror::Error;

/// Failures reported by a [`Transport`](crate::Transport) adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Send attempted before `connect` succeeded (or after `disconnect`).
    #[error("transport is not connected")]
    NotConnected,

    /// The connection could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The adapter failed below the delivery-status layer.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::NotConnected => "transport_not_connected",
            TransportError::Connect(_) => "transport_connect",
            TransportError::Protocol(_) => "transport_protocol",
        }
    }
}

/// Errors returned synchronously by the reliable publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The buffer refused the message (full, or the priority is too low to evict).
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A transport pass-through (`connect`) failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The publisher configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The publisher was constructed outside a tokio runtime.
    #[error("no tokio runtime available for the drain loop")]
    NoRuntime,
}

impl PublishError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Buffer(e) => e.as_label(),
            PublishError::Transport(e) => e.as_label(),
            PublishError::Config(_) => "publish_config",
            PublishError::NoRuntime => "publish_no_runtime",
        }
    }

    /// True when the message was rejected because the buffer is full.
    pub fn is_buffer_full(&self) -> bool {
        matches!(self, PublishError::Buffer(BufferError::Full { .. }))
    }
}

/// Errors returned when a signal is handed to the scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The signal is missing a required field or carries a bad item.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// An inbound payload could not be decoded.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The inbound payload decoded to a message that is not a signal.
    #[error("expected a signal, got topic `{0}`")]
    NotASignal(&'static str),

    /// The scheduler configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The scheduler was used outside a tokio runtime.
    #[error("no tokio runtime available for signal timers")]
    NoRuntime,
}

impl ScheduleError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::Signal(e) => e.as_label(),
            ScheduleError::Schema(e) => e.as_label(),
            ScheduleError::NotASignal(_) => "schedule_not_a_signal",
            ScheduleError::Config(_) => "schedule_config",
            ScheduleError::NoRuntime => "schedule_no_runtime",
        }
    }
}

/// Invalid runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    /// Offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}
