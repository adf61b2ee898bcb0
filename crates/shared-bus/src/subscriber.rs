//! # Subscriptions
//!
//! Defines the receiving side of the bus.

use crate::events::BusEvent;
use crate::publisher::TopicRegistry;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The broker refused or could not open the subscription.
    #[error("subscribe to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    /// The broker rejected the publish.
    #[error("publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// No event arrived within the receive bound.
    #[error("no event on {topic} within {after:?}")]
    Timeout { topic: String, after: Duration },

    /// The subscription or the broker behind it is gone.
    #[error("subscription to {topic} closed")]
    Closed { topic: String },

    /// The broker connection failed.
    #[error("broker connection error: {0}")]
    Connection(String),
}

/// An exclusively owned subscription on one topic.
#[async_trait]
pub trait BusSubscription: Send {
    /// Topic this subscription is bound to.
    fn topic(&self) -> &str;

    /// Wait up to `timeout` for the next event.
    async fn receive(&mut self, timeout: Duration) -> Result<BusEvent, TransportError>;

    /// Release the subscription. Idempotent.
    async fn close(&mut self);
}

/// Subscription handle on an [`InMemoryBus`](crate::InMemoryBus).
///
/// When dropped without `close`, the subscription is still unregistered.
pub struct InMemorySubscription {
    /// Registration id within the topic.
    id: u64,

    /// Topic this subscription listens on.
    topic: String,

    /// Events routed to this subscription.
    receiver: mpsc::Receiver<BusEvent>,

    /// Reference to the bus registry (for cleanup).
    registry: Arc<RwLock<TopicRegistry>>,

    closed: bool,
}

impl InMemorySubscription {
    pub(crate) fn new(
        id: u64,
        topic: String,
        receiver: mpsc::Receiver<BusEvent>,
        registry: Arc<RwLock<TopicRegistry>>,
    ) -> Self {
        Self {
            id,
            topic,
            receiver,
            registry,
            closed: false,
        }
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn unregister(&self) {
        let Ok(mut topics) = self.registry.write() else {
            return;
        };
        let Some(subscribers) = topics.get_mut(&self.topic) else {
            return;
        };

        subscribers.remove(&self.id);
        if subscribers.is_empty() {
            topics.remove(&self.topic);
        }
        debug!(topic = %self.topic, "Subscription released");
    }
}

#[async_trait]
impl BusSubscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn receive(&mut self, timeout: Duration) -> Result<BusEvent, TransportError> {
        if self.closed {
            return Err(TransportError::Closed {
                topic: self.topic.clone(),
            });
        }

        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(TransportError::Closed {
                topic: self.topic.clone(),
            }),
            Err(_) => Err(TransportError::Timeout {
                topic: self.topic.clone(),
                after: timeout,
            }),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.unregister();
        self.receiver.close();
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        if !self.closed {
            self.unregister();
        }
    }
}
