//! Transport boundary and delivery-status taxonomy
//!
//! The hub connection itself lives outside this crate. An adapter implements
//! [`Transport`] and maps whatever its protocol reports onto
//! [`DeliveryStatus`]; the publisher only ever looks at the
//! [`Outcome`] class of a status.
//!
//! | class          | statuses                                                                 |
//! |----------------|--------------------------------------------------------------------------|
//! | `Delivered`    | `OK`, `OK_EMPTY`                                                         |
//! | `Rejected`     | `BAD_FORMAT`, `UNAUTHORIZED`, `HUB_OR_DEVICE_NOT_FOUND`, `PRECONDITION_FAILED`, `ENTITY_TOO_LARGE`, `MESSAGE_EXPIRED` |
//! | `Retry`        | `THROTTLED`, `SERVER_BUSY`, `INTERNAL_SERVER_ERROR`, `TOO_MANY_DEVICES`  |
//! | `Unclassified` | anything else                                                            |

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use flexlink_core::Token;

use crate::error::TransportError;

/// How the publisher treats a delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Accepted by the hub.
    Delivered,
    /// Permanently refused; retrying will not help.
    Rejected,
    /// Transient overload; retry after backing off.
    Retry,
    /// Not in the known taxonomy.
    Unclassified,
}

impl Outcome {
    /// Delivered and rejected statuses both end the message's life.
    pub fn is_terminal(self) -> bool {
        matches!(self, Outcome::Delivered | Outcome::Rejected)
    }
}

/// Delivery status reported by a transport for one send
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    Ok,
    OkEmpty,
    BadFormat,
    Unauthorized,
    HubOrDeviceNotFound,
    PreconditionFailed,
    EntityTooLarge,
    MessageExpired,
    Throttled,
    ServerBusy,
    InternalServerError,
    TooManyDevices,
    /// Generic transport-level failure with no finer code.
    Error,
    /// A code this crate does not know.
    Other(String),
}

impl DeliveryStatus {
    /// Classifies the status.
    pub fn outcome(&self) -> Outcome {
        use DeliveryStatus::*;
        match self {
            Ok | OkEmpty => Outcome::Delivered,
            BadFormat | Unauthorized | HubOrDeviceNotFound | PreconditionFailed
            | EntityTooLarge | MessageExpired => Outcome::Rejected,
            Throttled | ServerBusy | InternalServerError | TooManyDevices => Outcome::Retry,
            Error | Other(_) => Outcome::Unclassified,
        }
    }

    /// Wire code, e.g. `SERVER_BUSY`.
    pub fn as_code(&self) -> &str {
        use DeliveryStatus::*;
        match self {
            Ok => "OK",
            OkEmpty => "OK_EMPTY",
            BadFormat => "BAD_FORMAT",
            Unauthorized => "UNAUTHORIZED",
            HubOrDeviceNotFound => "HUB_OR_DEVICE_NOT_FOUND",
            PreconditionFailed => "PRECONDITION_FAILED",
            EntityTooLarge => "ENTITY_TOO_LARGE",
            MessageExpired => "MESSAGE_EXPIRED",
            Throttled => "THROTTLED",
            ServerBusy => "SERVER_BUSY",
            InternalServerError => "INTERNAL_SERVER_ERROR",
            TooManyDevices => "TOO_MANY_DEVICES",
            Error => "ERROR",
            Other(code) => code,
        }
    }

    /// Human-readable description handed to the publish-status callback.
    pub fn describe(&self) -> &'static str {
        use DeliveryStatus::*;
        match self {
            Ok => "message delivered",
            OkEmpty => "message delivered, empty acknowledgement",
            BadFormat => "message rejected: malformed request",
            Unauthorized => "message rejected: device is not authorized",
            HubOrDeviceNotFound => "message rejected: hub or device not found",
            PreconditionFailed => "message rejected: precondition failed",
            EntityTooLarge => "message rejected: payload too large",
            MessageExpired => "message rejected: expired before delivery",
            Throttled => "hub is throttling the device, will retry",
            ServerBusy => "hub is busy, will retry",
            InternalServerError => "hub reported an internal error, will retry",
            TooManyDevices => "too many devices connected, will retry",
            Error => "transport reported an unspecified error",
            Other(_) => "unrecognised delivery status",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = Infallible;

    /// Maps a wire code onto a status; unknown codes become [`DeliveryStatus::Other`].
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        use DeliveryStatus::*;
        Result::Ok(match code {
            "OK" => Ok,
            "OK_EMPTY" => OkEmpty,
            "BAD_FORMAT" => BadFormat,
            "UNAUTHORIZED" => Unauthorized,
            "HUB_OR_DEVICE_NOT_FOUND" | "DEVICE_NOT_FOUND" => HubOrDeviceNotFound,
            "PRECONDITION_FAILED" => PreconditionFailed,
            "ENTITY_TOO_LARGE" | "MESSAGE_TOO_LARGE" => EntityTooLarge,
            "MESSAGE_EXPIRED" | "MESSAGE_CANCELLED_ONCLOSE" => MessageExpired,
            "THROTTLED" => Throttled,
            "SERVER_BUSY" => ServerBusy,
            "INTERNAL_SERVER_ERROR" => InternalServerError,
            "TOO_MANY_DEVICES" => TooManyDevices,
            "ERROR" => Error,
            other => Other(other.to_string()),
        })
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Receives `(token, status)` for every completed send.
pub type DeliveryCallback = Arc<dyn Fn(Token, DeliveryStatus) + Send + Sync>;

/// Receives raw inbound signal payloads.
pub type InboundCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Connection to the hub, as seen by the publisher
///
/// `send` must not block on the network: it hands the message to the
/// adapter and returns, and the outcome arrives later through the
/// callback registered with [`on_delivery_status`](Transport::on_delivery_status),
/// keyed by the token passed to `send`.
#[async_trait]
pub trait Transport<M>: Send + Sync {
    /// Opens the connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Closes the connection. Idempotent.
    async fn disconnect(&self);

    /// Queues `message` for delivery under `token`.
    fn send(&self, message: Arc<M>, token: Token) -> Result<(), TransportError>;

    /// Registers the delivery-status callback, replacing any previous one.
    fn on_delivery_status(&self, callback: DeliveryCallback);

    /// Registers the inbound signal callback, replacing any previous one.
    fn on_inbound_signal(&self, callback: InboundCallback);

    /// Stops receiving inbound signals.
    fn disable_subscription(&self) {}

    /// Whether `send` is currently expected to succeed.
    fn is_connected(&self) -> bool;
}
