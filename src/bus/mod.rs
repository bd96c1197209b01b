//! In-process event bus.
//!
//! # Data Flow
//! ```text
//! ContractPublisher ──send──▶ "resourcesreconciler.core" ──▶ reconciler consumer(s)
//! Ingress workers   ──send──▶ "receiver.ingress"         ──▶ backend producer(s)
//! ```
//!
//! # Design Decisions
//! - Addresses are plain strings known statically by both ends
//! - Delivery is fire-and-forget: a send with no consumer is dropped
//! - Every consumer on an address receives every message
//! - Closing the bus rejects later sends and drops all consumers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::lifecycle::resource::{CloseError, CloseStage, ResourceHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("event bus is closed")]
    Closed,
}

/// A message routed by address.
#[derive(Debug, Clone)]
pub struct Message {
    pub address: String,
    pub headers: Vec<(String, String)>,
    pub payload: Arc<[u8]>,
}

impl Message {
    pub fn new(address: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            address: address.into(),
            headers: Vec::new(),
            payload: payload.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct BusInner {
    consumers: DashMap<String, Vec<mpsc::UnboundedSender<Message>>>,
    closed: AtomicBool,
}

/// Cheaply cloneable handle to the process-wide bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a consumer to `address`.
    pub fn consumer(&self, address: &str) -> Result<mpsc::UnboundedReceiver<Message>, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .consumers
            .entry(address.to_string())
            .or_default()
            .push(tx);
        tracing::debug!(address, "Consumer attached");
        Ok(rx)
    }

    /// Deliver `message` to every live consumer of its address.
    ///
    /// Returns how many consumers received it; zero is not an error.
    pub fn send(&self, message: Message) -> Result<usize, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let Some(mut senders) = self.inner.consumers.get_mut(&message.address) else {
            tracing::debug!(address = %message.address, "No consumer for address, message dropped");
            return Ok(0);
        };
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(senders.len())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.consumers.clear();
            tracing::info!("Event bus closed");
        }
    }

    /// Teardown handle for the coordinator.
    pub fn handle(&self) -> EventBusHandle {
        EventBusHandle { bus: self.clone() }
    }
}

pub struct EventBusHandle {
    bus: EventBus,
}

impl ResourceHandle for EventBusHandle {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn stage(&self) -> CloseStage {
        CloseStage::Substrate
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            self.bus.close();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_consumer_receives() {
        let bus = EventBus::new();
        let mut a = bus.consumer("topic").unwrap();
        let mut b = bus.consumer("topic").unwrap();

        let delivered = bus.send(Message::new("topic", b"hello".to_vec())).unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(&*a.recv().await.unwrap().payload, b"hello");
        assert_eq!(&*b.recv().await.unwrap().payload, b"hello");
    }

    #[test]
    fn test_send_without_consumer_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.send(Message::new("nobody", Vec::<u8>::new())), Ok(0));
    }

    #[test]
    fn test_dropped_consumers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.consumer("topic").unwrap();
        drop(rx);
        assert_eq!(bus.send(Message::new("topic", Vec::<u8>::new())), Ok(0));
    }

    #[tokio::test]
    async fn test_closed_bus_rejects() {
        let bus = EventBus::new();
        let mut rx = bus.consumer("topic").unwrap();
        Box::new(bus.handle()).close().await.unwrap();

        assert_eq!(bus.send(Message::new("topic", Vec::<u8>::new())), Err(BusError::Closed));
        assert!(bus.consumer("topic").is_err());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_headers_lookup() {
        let message = Message::new("a", Vec::<u8>::new()).with_header("ce-type", "dev.example");
        assert_eq!(message.header("ce-type"), Some("dev.example"));
        assert_eq!(message.header("missing"), None);
    }
}
