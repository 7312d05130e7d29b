//! In-process [`Transport`] for tests and local wiring.
//!
//! Sends are recorded instead of going anywhere. Statuses are reported by
//! calling [`MemoryTransport::complete`], or automatically when an auto-ack
//! status is configured. Inbound signals are injected with
//! [`MemoryTransport::inject_signal`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use flexlink_core::Token;
use log::debug;

use crate::error::TransportError;
use crate::transport::{DeliveryCallback, DeliveryStatus, InboundCallback, Transport};

struct State<M> {
    connected: bool,
    subscribed: bool,
    sent: Vec<(Token, Arc<M>)>,
    auto_ack: Option<DeliveryStatus>,
    on_status: Option<DeliveryCallback>,
    on_inbound: Option<InboundCallback>,
}

/// Transport that keeps everything in memory
pub struct MemoryTransport<M> {
    state: Mutex<State<M>>,
    require_connect: bool,
}

impl<M> Default for MemoryTransport<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MemoryTransport<M> {
    /// Accepts sends without a prior `connect`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                connected: false,
                subscribed: true,
                sent: Vec::new(),
                auto_ack: None,
                on_status: None,
                on_inbound: None,
            }),
            require_connect: false,
        }
    }

    /// Rejects sends with [`TransportError::NotConnected`] until `connect`.
    pub fn strict() -> Self {
        Self {
            require_connect: true,
            ..Self::new()
        }
    }

    /// Every send is immediately completed with `status`.
    pub fn with_auto_ack(self, status: DeliveryStatus) -> Self {
        self.lock().auto_ack = Some(status);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports `status` for `token` through the registered callback.
    pub fn complete(&self, token: Token, status: DeliveryStatus) {
        let callback = self.lock().on_status.clone();
        if let Some(callback) = callback {
            callback(token, status);
        }
    }

    /// Delivers a raw inbound payload, as if it came from the hub.
    /// Returns `false` when nobody is listening.
    pub fn inject_signal(&self, payload: impl Into<String>) -> bool {
        let callback = {
            let state = self.lock();
            if !state.subscribed {
                return false;
            }
            state.on_inbound.clone()
        };
        match callback {
            Some(callback) => {
                callback(payload.into());
                true
            }
            None => false,
        }
    }

    /// Tokens in the order they were sent, including repeats.
    pub fn sent_tokens(&self) -> Vec<Token> {
        self.lock().sent.iter().map(|(token, _)| *token).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Messages in the order they were sent.
    pub fn sent_messages(&self) -> Vec<Arc<M>> {
        self.lock().sent.iter().map(|(_, message)| Arc::clone(message)).collect()
    }
}

#[async_trait]
impl<M: Send + Sync + 'static> Transport<M> for MemoryTransport<M> {
    async fn connect(&self) -> Result<(), TransportError> {
        self.lock().connected = true;
        debug!("memory transport connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.lock().connected = false;
    }

    fn send(&self, message: Arc<M>, token: Token) -> Result<(), TransportError> {
        let ack = {
            let mut state = self.lock();
            if self.require_connect && !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.sent.push((token, message));
            state.auto_ack.clone().zip(state.on_status.clone())
        };
        if let Some((status, callback)) = ack {
            callback(token, status);
        }
        Ok(())
    }

    fn on_delivery_status(&self, callback: DeliveryCallback) {
        self.lock().on_status = Some(callback);
    }

    fn on_inbound_signal(&self, callback: InboundCallback) {
        let mut state = self.lock();
        state.on_inbound = Some(callback);
        state.subscribed = true;
    }

    fn disable_subscription(&self) {
        self.lock().subscribed = false;
    }

    fn is_connected(&self) -> bool {
        let state = self.lock();
        state.connected || !self.require_connect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn strict_transport_requires_connect() {
        let transport = MemoryTransport::<&str>::strict();
        assert_eq!(
            transport.send(Arc::new("x"), 1),
            Err(TransportError::NotConnected)
        );
        transport.connect().await.unwrap();
        transport.send(Arc::new("x"), 1).unwrap();
        assert_eq!(transport.sent_tokens(), vec![1]);

        transport.disconnect().await;
        assert!(!transport.is_connected());
    }

    #[test]
    fn auto_ack_reports_every_send() {
        let transport = MemoryTransport::<u8>::new().with_auto_ack(DeliveryStatus::Ok);
        let acks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&acks);
        transport.on_delivery_status(Arc::new(move |_, status| {
            assert_eq!(status, DeliveryStatus::Ok);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        transport.send(Arc::new(1), 1).unwrap();
        transport.send(Arc::new(2), 2).unwrap();
        assert_eq!(acks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disabled_subscription_drops_inbound() {
        let transport = MemoryTransport::<u8>::new();
        assert!(!transport.inject_signal("{}"));

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        transport.on_inbound_signal(Arc::new(move |payload| {
            sink.lock().unwrap().push(payload);
        }));
        assert!(transport.inject_signal("a"));

        transport.disable_subscription();
        assert!(!transport.inject_signal("b"));
        assert_eq!(*received.lock().unwrap(), vec!["a".to_string()]);
    }
}
