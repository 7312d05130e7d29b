//! At-least-once publisher over a [`Transport`]
//!
//! ## Lifecycle of one message
//!
//! ```text
//!   publish ──► Buffered ──► Leased ──send──► status callback
//!                  ▲                              │
//!                  │  Retry (backoff, release)    │
//!                  └──────────────────────────────┤
//!                                                 │ Delivered / Rejected / Unclassified
//!                                                 ▼
//!                                              Deleted
//! ```
//!
//! `publish` scores the message, buffers it and, unless a backoff window is
//! open, sends it straight away. A background drain loop picks up whatever is
//! left: it leases the highest-priority free entry and sends it, sleeps for
//! `idle_poll` when nothing is leasable, and sleeps out any open backoff
//! window before sending again.
//!
//! Delivery statuses come back through the transport's callback and are
//! classified with [`DeliveryStatus::outcome`]:
//!
//! - `Delivered` / `Rejected`: reset backoff, delete, notify the user
//! - `Retry`: widen backoff, release for the drain loop
//! - `Unclassified`: delete and notify, logged as an error
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use flexlink_device::{MemoryTransport, PublisherConfig, ReliablePublisher, DeliveryStatus};
//! use flexlink_schemas::{FfrPrioritizer, Message, Reading, types};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(MemoryTransport::<Message>::new());
//! let publisher = ReliablePublisher::new(transport.clone(), FfrPrioritizer, PublisherConfig::default())?;
//! publisher.connect().await?;
//!
//! let token = publisher.publish(Reading::new("L1", types::POWER, 1.5).into())?;
//! assert_eq!(transport.sent_tokens(), vec![token]);
//!
//! transport.complete(token, DeliveryStatus::Ok);
//! assert!(publisher.buffer().is_empty());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use flexlink_core::{PriorityBuffer, Prioritizer, Token};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffController;
use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::transport::{DeliveryStatus, Outcome, Transport};

/// Final status of one published message, as seen by the application
pub struct PublishStatus<M> {
    pub token: Token,
    pub status: DeliveryStatus,
    /// `None` if the entry was already gone (evicted) when the status arrived.
    pub message: Option<Arc<M>>,
}

impl<M> PublishStatus<M> {
    pub fn outcome(&self) -> Outcome {
        self.status.outcome()
    }

    pub fn description(&self) -> &'static str {
        self.status.describe()
    }
}

impl<M> fmt::Debug for PublishStatus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishStatus")
            .field("token", &self.token)
            .field("status", &self.status)
            .field("has_message", &self.message.is_some())
            .finish()
    }
}

/// Receives the final status of every message that leaves the buffer.
pub type PublishCallback<M> = Arc<dyn Fn(PublishStatus<M>) + Send + Sync>;

struct Shared<M> {
    buffer: PriorityBuffer<M>,
    backoff: BackoffController,
    transport: Arc<dyn Transport<M>>,
    prioritizer: Arc<dyn Prioritizer<M>>,
    on_publish: RwLock<Option<PublishCallback<M>>>,
    idle_poll: Duration,
}

impl<M: Send + Sync + 'static> Shared<M> {
    /// Hands a leased entry to the transport. A synchronous send failure
    /// counts as a retriable status.
    fn send(&self, token: Token, message: Arc<M>) {
        if let Err(err) = self.transport.send(message, token) {
            warn!("send of token {} failed ({}), backing off", token, err.as_label());
            self.backoff.on_retriable();
            self.buffer.release(token);
        }
    }

    fn on_status(&self, token: Token, status: DeliveryStatus) {
        match status.outcome() {
            Outcome::Delivered => {
                debug!("token {} delivered ({})", token, status);
                self.backoff.on_terminal();
                self.finish(token, status);
            }
            Outcome::Rejected => {
                warn!("token {} rejected: {}", token, status.describe());
                self.backoff.on_terminal();
                self.finish(token, status);
            }
            Outcome::Retry => {
                warn!("token {} not delivered ({}), will retry", token, status);
                self.backoff.on_retriable();
                self.buffer.release(token);
            }
            Outcome::Unclassified => {
                error!("token {} got unexpected delivery status {}, dropping", token, status);
                self.finish(token, status);
            }
        }
    }

    fn finish(&self, token: Token, status: DeliveryStatus) {
        let message = self.buffer.get(token).ok().map(|entry| entry.into_payload());
        self.buffer.delete(token);

        let callback = self
            .on_publish
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(PublishStatus { token, status, message });
        }
    }
}

/// Buffers outbound messages and retries them until the hub gives a final answer
pub struct ReliablePublisher<M: Send + Sync + 'static> {
    shared: Arc<Shared<M>>,
    cancel: CancellationToken,
    drain: Option<JoinHandle<()>>,
}

impl<M: Send + Sync + 'static> ReliablePublisher<M> {
    /// Wraps `transport` and starts the drain loop on the current tokio runtime.
    pub fn new<T, P>(transport: Arc<T>, prioritizer: P, config: PublisherConfig) -> Result<Self, PublishError>
    where
        T: Transport<M> + 'static,
        P: Prioritizer<M> + 'static,
    {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| PublishError::NoRuntime)?;
        let transport: Arc<dyn Transport<M>> = transport;

        let shared = Arc::new(Shared {
            buffer: PriorityBuffer::new(config.capacity)?,
            backoff: BackoffController::new(config.retry),
            transport,
            prioritizer: Arc::new(prioritizer),
            on_publish: RwLock::new(None),
            idle_poll: config.idle_poll,
        });

        let weak: Weak<Shared<M>> = Arc::downgrade(&shared);
        shared.transport.on_delivery_status(Arc::new(move |token, status| {
            if let Some(shared) = weak.upgrade() {
                shared.on_status(token, status);
            }
        }));

        let cancel = CancellationToken::new();
        let drain = handle.spawn(drain_loop(Arc::clone(&shared), cancel.clone()));

        Ok(Self {
            shared,
            cancel,
            drain: Some(drain),
        })
    }

    /// Buffers `message` and sends it now unless backing off.
    ///
    /// Fails only when the buffer refuses the message; that failure is not
    /// retried.
    pub fn publish(&self, message: M) -> Result<Token, PublishError> {
        let shared = &self.shared;
        let priority = shared.prioritizer.score(&message);
        let send_now = !shared.backoff.is_backing_off();

        let token = shared.buffer.put(message, priority, send_now)?;
        if send_now {
            if let Ok(entry) = shared.buffer.get(token) {
                shared.send(token, entry.into_payload());
            }
        } else {
            debug!("backing off, token {} left for the drain loop", token);
        }
        Ok(token)
    }

    /// Same as [`publish`](Self::publish).
    pub fn publish_and_get_token(&self, message: M) -> Result<Token, PublishError> {
        self.publish(message)
    }

    /// Registers the callback that receives every final delivery status.
    pub fn on_publish<F>(&self, callback: F)
    where
        F: Fn(PublishStatus<M>) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_publish
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub async fn connect(&self) -> Result<(), PublishError> {
        self.shared.transport.connect().await?;
        info!("publisher connected");
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.shared.transport.disconnect().await;
        info!("publisher disconnected");
    }

    /// Forwards raw inbound signal payloads to `callback`.
    pub fn on_signal<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.shared.transport.on_inbound_signal(Arc::new(callback));
    }

    pub fn disable_subscription(&self) {
        self.shared.transport.disable_subscription();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_connected()
    }

    /// The underlying buffer, for inspection.
    pub fn buffer(&self) -> &PriorityBuffer<M> {
        &self.shared.buffer
    }

    pub fn backoff(&self) -> &BackoffController {
        &self.shared.backoff
    }

    /// Stops the drain loop and waits for it to exit. Buffered messages stay
    /// in the buffer; in-flight sends complete through the transport.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(drain) = self.drain.take() {
            if let Err(err) = drain.await {
                error!("drain loop ended abnormally: {}", err);
            }
        }
    }
}

impl<M: Send + Sync + 'static> Drop for ReliablePublisher<M> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Sleeps until `deadline`. Returns `false` if cancelled first.
async fn pause_until(deadline: Instant, cancel: &CancellationToken) -> bool {
    let sleep = time::sleep_until(deadline);
    tokio::pin!(sleep);
    select! {
        _ = &mut sleep => true,
        _ = cancel.cancelled() => false,
    }
}

async fn drain_loop<M: Send + Sync + 'static>(shared: Arc<Shared<M>>, cancel: CancellationToken) {
    debug!("drain loop started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(until) = shared.backoff.backoff_until() {
            if !pause_until(until, &cancel).await {
                break;
            }
            continue;
        }

        match shared.buffer.peek_lease() {
            Ok(entry) => {
                let token = entry.token();
                debug!("draining token {}", token);
                shared.send(token, entry.into_payload());
                tokio::task::yield_now().await;
            }
            Err(_) => {
                if !pause_until(Instant::now() + shared.idle_poll, &cancel).await {
                    break;
                }
            }
        }
    }
    debug!("drain loop stopped");
}
