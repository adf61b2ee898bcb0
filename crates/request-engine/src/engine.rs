//! Correlated request engine - synchronous calls over pub/sub.
//!
//! Flow of one call:
//! 1. Derive a unique reply topic from the destination
//! 2. Subscribe to the reply topic
//! 3. On the subscription confirmation, publish the request envelope
//! 4. Hand back the first message on the reply topic, or fail once the
//!    deadline passes: one `receive_timeout` for the confirmation, a fresh
//!    one for the reply after publishing
//! 5. Close the subscription on every exit path
//!
//! Steps 2-5 run on their own task; the caller awaits a oneshot for the
//! single outcome.

use crate::config::EngineConfig;
use crate::envelope::{RequestEnvelope, ENVELOPE_SEPARATOR};
use crate::error::CallError;
use crate::topic::ReplyTopic;
use bytes::Bytes;
use serde::Serialize;
use shared_bus::{BusEvent, BusSubscription, BusTransport, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Counters across all calls made through one engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Calls started
    pub calls: AtomicU64,
    /// Calls answered with a reply
    pub succeeded: AtomicU64,
    /// Calls that hit the receive bound
    pub timed_out: AtomicU64,
    /// Calls that failed for any other reason
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub calls: u64,
    pub succeeded: u64,
    pub timed_out: u64,
    pub failed: u64,
}

impl EngineStats {
    fn record(&self, outcome: &Result<Bytes, CallError>) {
        let counter = match outcome {
            Ok(_) => &self.succeeded,
            Err(e) if e.is_timeout() => &self.timed_out,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Issues correlated requests over a [`BusTransport`].
///
/// The transport is shared by every call; each call owns its subscription.
/// Cloning the engine is cheap and clones share counters.
pub struct RequestEngine<T: BusTransport> {
    transport: Arc<T>,
    config: EngineConfig,
    stats: Arc<EngineStats>,
}

impl<T: BusTransport> Clone for RequestEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T: BusTransport> RequestEngine<T> {
    /// Create an engine with the default configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: Arc<T>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Publish `payload` to `destination` and wait for its single reply.
    ///
    /// Exactly one outcome is produced. Replies after the first are never
    /// observed: the subscription is closed as soon as the first arrives.
    pub async fn call(&self, destination: &str, payload: Bytes) -> Result<Bytes, CallError> {
        if destination.is_empty() || destination.contains(ENVELOPE_SEPARATOR) {
            return Err(CallError::InvalidDestination);
        }
        self.stats.calls.fetch_add(1, Ordering::Relaxed);

        let reply_topic = ReplyTopic::derive(destination);
        let span = info_span!(
            "bus_call",
            destination = %destination,
            reply_topic = %reply_topic,
        );

        let exchange = Exchange {
            transport: Arc::clone(&self.transport),
            destination: destination.to_string(),
            reply_topic: reply_topic.into_string(),
            payload,
            receive_timeout: self.config.receive_timeout,
        };

        let (tx, rx) = oneshot::channel();
        tokio::spawn(
            async move {
                let outcome = exchange.run().await;
                // Fails only when the caller stopped waiting
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );

        let outcome = rx.await.unwrap_or(Err(CallError::Abandoned));
        self.stats.record(&outcome);
        outcome
    }
}

/// State owned by the receive task of one call.
struct Exchange<T: BusTransport> {
    transport: Arc<T>,
    destination: String,
    reply_topic: String,
    payload: Bytes,
    receive_timeout: Duration,
}

impl<T: BusTransport> Exchange<T> {
    async fn run(self) -> Result<Bytes, CallError> {
        let mut subscription = self
            .transport
            .subscribe(&self.reply_topic)
            .await
            .map_err(|source| CallError::SubscribeFailed {
                reply_topic: self.reply_topic.clone(),
                source,
            })?;
        debug!("Subscribed to reply topic");

        let outcome = self.await_reply(&mut subscription).await;
        subscription.close().await;
        outcome
    }

    /// Wait for the confirmation, publish, then wait for the reply.
    ///
    /// Each phase gets one `receive_timeout` deadline. Ignored events do not
    /// extend it.
    async fn await_reply(&self, subscription: &mut T::Subscription) -> Result<Bytes, CallError> {
        let mut published = false;
        let mut deadline = Instant::now() + self.receive_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = if remaining.is_zero() {
                Err(TransportError::Timeout {
                    topic: self.reply_topic.clone(),
                    after: remaining,
                })
            } else {
                subscription.receive(remaining).await
            };

            let event = match received {
                Ok(event) => event,
                Err(TransportError::Timeout { .. }) => {
                    warn!(
                        published,
                        timeout_ms = self.receive_timeout.as_millis() as u64,
                        "Request timed out"
                    );
                    return Err(CallError::Timeout {
                        reply_topic: self.reply_topic.clone(),
                        after: self.receive_timeout,
                    });
                }
                Err(source) => {
                    return Err(CallError::ReceiveFailed {
                        reply_topic: self.reply_topic.clone(),
                        source,
                    });
                }
            };

            match event {
                BusEvent::Confirmed { .. } if published => {
                    warn!("Duplicate subscription confirmation ignored");
                }
                BusEvent::Confirmed { .. } => {
                    self.publish_request().await?;
                    published = true;
                    deadline = Instant::now() + self.receive_timeout;
                }
                BusEvent::Message { channel, payload } if channel == self.reply_topic => {
                    debug!(bytes = payload.len(), "Received reply");
                    return Ok(payload);
                }
                BusEvent::Message { channel, .. } => {
                    warn!(channel = %channel, "Ignoring message from foreign channel");
                }
                BusEvent::Unrecognized { kind } => {
                    return Err(CallError::ProtocolViolation {
                        reply_topic: self.reply_topic.clone(),
                        kind,
                    });
                }
            }
        }
    }

    async fn publish_request(&self) -> Result<(), CallError> {
        let envelope = RequestEnvelope::new(self.reply_topic.as_str(), self.payload.clone());
        let receivers = self
            .transport
            .publish(&self.destination, envelope.encode())
            .await
            .map_err(|source| CallError::PublishFailed {
                destination: self.destination.clone(),
                source,
            })?;

        debug!(receivers, "Subscription confirmed, request published");
        if receivers == 0 {
            warn!("No responder is listening on the destination topic");
        }
        Ok(())
    }
}
