//! # Redis Adapter
//!
//! Maps Redis `SUBSCRIBE`/`PUBLISH` onto the bus contract.
//!
//! Publishes share one multiplexed connection. Every subscription opens a
//! dedicated pub/sub connection, because a connection in subscriber mode
//! cannot issue other commands.

use crate::events::BusEvent;
use crate::publisher::BusTransport;
use crate::subscriber::{BusSubscription, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed bus transport.
pub struct RedisBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisBus {
    /// Connect to the broker at `address` (`host:port` or a `redis://` URL)
    /// and verify it answers `PING`.
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let url = connection_url(address);
        let client =
            redis::Client::open(url.as_str()).map_err(|e| TransportError::Connection(e.to_string()))?;

        let mut publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut publisher)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        info!(address = address, reply = %pong, "Connected to Redis broker");

        Ok(Self { client, publisher })
    }
}

/// Accept bare `host:port` the way the gateway configuration is written.
fn connection_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{address}/")
    }
}

#[async_trait]
impl BusTransport for RedisBus {
    type Subscription = RedisSubscription;

    async fn subscribe(&self, topic: &str) -> Result<RedisSubscription, TransportError> {
        let subscribe_failed = |e: redis::RedisError| TransportError::SubscribeFailed {
            topic: topic.to_string(),
            reason: e.to_string(),
        };

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(subscribe_failed)?;
        // Resolves once the server has acknowledged the SUBSCRIBE
        pubsub.subscribe(topic).await.map_err(subscribe_failed)?;

        debug!(topic = topic, "Redis subscription acknowledged");

        Ok(RedisSubscription {
            topic: topic.to_string(),
            pubsub: Some(pubsub),
            confirmation_pending: true,
        })
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, TransportError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(topic, payload.as_ref())
            .await
            .map_err(|e| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        Ok(usize::try_from(receivers).unwrap_or(0))
    }
}

/// A Redis subscription on one channel.
pub struct RedisSubscription {
    topic: String,
    pubsub: Option<PubSub>,
    /// The SUBSCRIBE reply was consumed while subscribing; it is surfaced as
    /// the first event instead.
    confirmation_pending: bool,
}

#[async_trait]
impl BusSubscription for RedisSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn receive(&mut self, timeout: Duration) -> Result<BusEvent, TransportError> {
        if self.confirmation_pending {
            self.confirmation_pending = false;
            return Ok(BusEvent::Confirmed {
                topic: self.topic.clone(),
            });
        }

        let Some(pubsub) = self.pubsub.as_mut() else {
            return Err(TransportError::Closed {
                topic: self.topic.clone(),
            });
        };

        let messages = pubsub.on_message();
        tokio::pin!(messages);

        match tokio::time::timeout(timeout, messages.next()).await {
            Ok(Some(msg)) => Ok(BusEvent::Message {
                channel: msg.get_channel_name().to_string(),
                payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
            }),
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
        let Some(mut pubsub) = self.pubsub.take() else {
            return;
        };

        // Dropping the connection releases the subscription server-side even
        // if the UNSUBSCRIBE itself fails.
        if let Err(e) = pubsub.unsubscribe(self.topic.as_str()).await {
            debug!(topic = %self.topic, error = %e, "Redis unsubscribe failed");
        }
    }
}
