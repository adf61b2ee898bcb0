//! # Transport and In-Memory Broker
//!
//! Defines the publishing side of the bus and the broker that routes
//! messages to subscriptions.

use crate::events::BusEvent;
use crate::subscriber::{BusSubscription, InMemorySubscription, TransportError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Subscribers per topic, keyed by registration id.
pub(crate) type TopicRegistry = HashMap<String, HashMap<u64, mpsc::Sender<BusEvent>>>;

/// Capability object for talking to a pub/sub broker.
///
/// The connection behind it may be shared by many concurrent callers; each
/// subscription it hands out is owned by exactly one of them.
#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    /// Subscription handle produced by [`subscribe`](Self::subscribe).
    type Subscription: BusSubscription + 'static;

    /// Open a subscription on `topic`.
    ///
    /// The returned subscription yields [`BusEvent::Confirmed`] before any
    /// message.
    async fn subscribe(&self, topic: &str) -> Result<Self::Subscription, TransportError>;

    /// Publish `payload` on `topic`.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the message. Zero is not an
    /// error: delivery is best-effort.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, TransportError>;
}

/// In-memory implementation of the bus.
///
/// Each subscription gets its own bounded `mpsc` channel; publishing routes a
/// message to every subscription registered on exactly that topic. Suitable
/// for single-process deployments and tests; networked deployments use the
/// Redis adapter.
pub struct InMemoryBus {
    /// Active subscriptions by topic.
    topics: Arc<RwLock<TopicRegistry>>,

    /// Next registration id.
    next_id: AtomicU64,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Per-subscription channel capacity.
    capacity: usize,

    /// Set once `shutdown` has been called.
    shut_down: AtomicBool,
}

impl InMemoryBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified per-subscription capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            // Room for the confirmation event is always required
            capacity: capacity.max(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Number of subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .map(|topics| topics.get(topic).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Number of subscriptions across all topics.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.topics
            .read()
            .map(|topics| topics.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Total messages published, including those nobody received.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get the per-subscription channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop the bus.
    ///
    /// Open subscriptions observe `Closed` on their next receive; later
    /// subscribe and publish calls fail.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        if let Ok(mut topics) = self.topics.write() {
            topics.clear();
        }
        debug!("In-memory bus shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusTransport for InMemoryBus {
    type Subscription = InMemorySubscription;

    async fn subscribe(&self, topic: &str) -> Result<InMemorySubscription, TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "bus shut down".to_string(),
            });
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        sender
            .try_send(BusEvent::Confirmed {
                topic: topic.to_string(),
            })
            .map_err(|e| TransportError::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut topics = self
                .topics
                .write()
                .map_err(|_| TransportError::SubscribeFailed {
                    topic: topic.to_string(),
                    reason: "topic registry poisoned".to_string(),
                })?;
            topics
                .entry(topic.to_string())
                .or_default()
                .insert(id, sender);
        }

        debug!(topic = topic, id = id, "New subscription created");

        Ok(InMemorySubscription::new(
            id,
            topic.to_string(),
            receiver,
            Arc::clone(&self.topics),
        ))
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: "bus shut down".to_string(),
            });
        }

        // Always increment counter (message was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let topics = self
            .topics
            .read()
            .map_err(|_| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: "topic registry poisoned".to_string(),
            })?;

        let Some(subscribers) = topics.get(topic) else {
            debug!(topic = topic, "Message dropped (no subscribers)");
            return Ok(0);
        };

        let mut delivered = 0;
        for (id, sender) in subscribers {
            match sender.try_send(BusEvent::message(topic, payload.clone())) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(topic = topic, id = id, "Subscriber lagging, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(topic = topic, id = id, "Skipping closed subscriber");
                }
            }
        }

        debug!(topic = topic, receivers = delivered, "Message published");
        Ok(delivered)
    }
}
