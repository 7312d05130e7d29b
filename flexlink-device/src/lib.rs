//! Device Runtime: Reliable Publishing and Signal Scheduling
//!
//! ## Overview
//!
//! This crate runs on the device side of a hub connection and has two jobs:
//!
//! 1. **Outbound**: [`ReliablePublisher`] buffers every message in a bounded
//!    priority buffer and keeps retrying it, with a shared backoff window,
//!    until the hub gives a final answer. Buffer space is reclaimed from the
//!    lowest-priority messages first.
//! 2. **Inbound**: [`SignalScheduler`] turns signals (piecewise-constant plans
//!    issued by the hub) into callback invocations at the right moment, and
//!    ignores signals that a newer one has superseded.
//!
//! The connection itself is abstracted by [`Transport`]. [`MemoryTransport`]
//! is an in-process implementation used in tests and examples.
//!
//! ## Wiring
//!
//! ```text
//!             publish(msg)                         inbound payload
//!                  │                                      │
//!                  ▼                                      ▼
//!   ┌──────────────────────────┐   status     ┌──────────────────────┐
//!   │ ReliablePublisher        │◄─────────────│ Transport            │
//!   │  PriorityBuffer          │──── send ───►│                      │
//!   │  BackoffController       │              └──────────┬───────────┘
//!   │  drain loop (tokio task) │                         │ on_signal
//!   └──────────────────────────┘                         ▼
//!                                             ┌──────────────────────┐
//!                                             │ SignalScheduler      │
//!                                             │  Watermarks          │
//!                                             │  timers + workers    │
//!                                             └──────────────────────┘
//! ```
//!
//! ## Runtime
//!
//! Both components spawn onto the tokio runtime that is current when they
//! are constructed, and return a `NoRuntime` error otherwise. Dropping a
//! component cancels its background tasks.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use flexlink_device::{MemoryTransport, PublisherConfig, ReliablePublisher, SchedulerConfig, SignalScheduler};
//! use flexlink_schemas::{FfrPrioritizer, Message};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(MemoryTransport::<Message>::new());
//! let publisher = ReliablePublisher::new(transport.clone(), FfrPrioritizer, PublisherConfig::default())?;
//! let scheduler = Arc::new(SignalScheduler::new(SchedulerConfig::default())?);
//!
//! let inbound = Arc::clone(&scheduler);
//! publisher.on_signal(move |payload| {
//!     let result = inbound.accept_json(&payload, |inv| {
//!         println!("{} {} = {}", inv.entity, inv.variable, inv.value);
//!     });
//!     if let Err(err) = result {
//!         log::warn!("bad signal: {err}");
//!     }
//! });
//! publisher.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod scheduler;
pub mod transport;
pub mod watermark;

pub use backoff::BackoffController;
pub use config::{PublisherConfig, RetryConfig, SchedulerConfig};
pub use error::{ConfigError, PublishError, ScheduleError, TransportError};
pub use memory::MemoryTransport;
pub use publisher::{PublishCallback, PublishStatus, ReliablePublisher};
pub use scheduler::{SignalCallback, SignalInvocation, SignalScheduler};
pub use transport::{DeliveryCallback, DeliveryStatus, InboundCallback, Outcome, Transport};
pub use watermark::Watermarks;
