//! Schema and signal errors

use flexlink_core::SpanError;
use thiserror_no_std::Error;

/// Result type for message decoding and validation
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while decoding, encoding or validating wire messages
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Payload is not valid JSON or does not match the shape for its topic
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// `topic` names no known message kind
    #[error("unknown message topic {0:?}")]
    UnknownTopic(String),

    /// Payload has no `topic` field
    #[error("message has no topic")]
    MissingTopic,

    /// Message has an empty `type`
    #[error("message type not defined")]
    MissingType,

    /// Message has an empty `entity`
    #[error("entity not defined")]
    MissingEntity,

    /// Signal failed validation
    #[error("invalid signal: {0}")]
    InvalidSignal(#[from] SignalError),
}

impl SchemaError {
    /// Returns a short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            SchemaError::Json(_) => "schema_json",
            SchemaError::UnknownTopic(_) => "schema_unknown_topic",
            SchemaError::MissingTopic => "schema_missing_topic",
            SchemaError::MissingType => "schema_missing_type",
            SchemaError::MissingEntity => "schema_missing_entity",
            SchemaError::InvalidSignal(_) => "schema_invalid_signal",
        }
    }
}

/// Reasons a signal cannot be scheduled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// `type` is empty
    #[error("signal has no type")]
    MissingType,

    /// `entities` is empty
    #[error("signal targets no entities")]
    NoEntities,

    /// `generated_at` is absent
    #[error("signal has no generated_at")]
    MissingGeneratedAt,

    /// A recurring item carries an unusable span or repeat
    #[error("signal item {index}: {source}")]
    Item {
        /// Position of the item in the signal
        index: usize,
        /// What was wrong with it
        source: SpanError,
    },
}

impl SignalError {
    /// Returns a short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::MissingType => "signal_missing_type",
            SignalError::NoEntities => "signal_no_entities",
            SignalError::MissingGeneratedAt => "signal_missing_generated_at",
            SignalError::Item { .. } => "signal_bad_item",
        }
    }
}
