//! Scripted transport for exercising the engine without a broker.
//!
//! Every interaction is appended to an operation log so tests can assert on
//! ordering (confirmation before publish) and cleanup (one close per call).

use crate::envelope::RequestEnvelope;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shared_bus::{BusEvent, BusSubscription, BusTransport, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One recorded interaction with the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Subscribe(String),
    /// A subscription handed its confirmation to the caller.
    Confirmed(String),
    Publish { topic: String, payload: Bytes },
    /// A subscription handed a message to the caller.
    Delivered(String),
    Close(String),
}

#[derive(Debug, Clone, Default)]
struct Script {
    fail_subscribe: bool,
    fail_publish: bool,
    withhold_confirmation: bool,
    confirm_twice: bool,
    drop_after_confirmation: bool,
    echo_request: bool,
    unrecognized: Option<String>,
    replies: Vec<Bytes>,
    foreign_replies: Vec<(String, Bytes)>,
    stray: Option<StrayMessages>,
}

/// Empty messages on an unrelated channel, sent on a fixed period.
#[derive(Debug, Clone)]
struct StrayMessages {
    channel: String,
    every: Duration,
    count: usize,
}

#[derive(Debug, Default)]
struct ScriptState {
    ops: Vec<Op>,
    inboxes: HashMap<String, mpsc::UnboundedSender<BusEvent>>,
}

/// A [`BusTransport`] whose broker behaviour is fixed up front.
///
/// By default subscriptions are confirmed and published requests go
/// unanswered. Builder methods add replies or inject failures.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Script,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to each published request with `payload`. Repeatable; replies
    /// are delivered in the order they were added.
    pub fn reply_with(mut self, payload: impl Into<Bytes>) -> Self {
        self.script.replies.push(payload.into());
        self
    }

    /// Reply to each published request with its own payload.
    pub fn echo_request(mut self) -> Self {
        self.script.echo_request = true;
        self
    }

    /// Deliver `payload` to the reply subscription, labelled with another
    /// channel.
    pub fn reply_on_channel(mut self, channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.script
            .foreign_replies
            .push((channel.into(), payload.into()));
        self
    }

    /// Send `count` empty messages labelled `channel` to every subscription,
    /// one each `every`, starting once subscribed.
    pub fn stray_messages(mut self, channel: impl Into<String>, every: Duration, count: usize) -> Self {
        self.script.stray = Some(StrayMessages {
            channel: channel.into(),
            every,
            count,
        });
        self
    }

    pub fn fail_subscribe(mut self) -> Self {
        self.script.fail_subscribe = true;
        self
    }

    pub fn fail_publish(mut self) -> Self {
        self.script.fail_publish = true;
        self
    }

    /// Never confirm subscriptions.
    pub fn withhold_confirmation(mut self) -> Self {
        self.script.withhold_confirmation = true;
        self
    }

    pub fn confirm_twice(mut self) -> Self {
        self.script.confirm_twice = true;
        self
    }

    /// Follow the confirmation with a signal of unknown `kind`.
    pub fn inject_after_confirmation(mut self, kind: impl Into<String>) -> Self {
        self.script.unrecognized = Some(kind.into());
        self
    }

    /// Close every subscription from the broker side once confirmed.
    pub fn drop_after_confirmation(mut self) -> Self {
        self.script.drop_after_confirmation = true;
        self
    }

    /// Full operation log.
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.collect(|op| match op {
            Op::Subscribe(topic) => Some(topic.clone()),
            _ => None,
        })
    }

    pub fn published_to(&self) -> Vec<String> {
        self.collect(|op| match op {
            Op::Publish { topic, .. } => Some(topic.clone()),
            _ => None,
        })
    }

    pub fn published_payloads(&self) -> Vec<Bytes> {
        self.collect(|op| match op {
            Op::Publish { payload, .. } => Some(payload.clone()),
            _ => None,
        })
    }

    pub fn close_count(&self) -> usize {
        self.collect(|op| matches!(op, Op::Close(_)).then_some(())).len()
    }

    pub fn delivered_messages(&self) -> usize {
        self.collect(|op| matches!(op, Op::Delivered(_)).then_some(())).len()
    }

    /// Subscriptions opened and not yet closed or dropped.
    pub fn open_subscriptions(&self) -> usize {
        self.state.lock().inboxes.len()
    }

    fn collect<R>(&self, f: impl Fn(&Op) -> Option<R>) -> Vec<R> {
        self.state.lock().ops.iter().filter_map(f).collect()
    }
}

#[async_trait]
impl BusTransport for ScriptedTransport {
    type Subscription = ScriptedSubscription;

    async fn subscribe(&self, topic: &str) -> Result<ScriptedSubscription, TransportError> {
        if self.script.fail_subscribe {
            return Err(TransportError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let confirmed = BusEvent::Confirmed {
            topic: topic.to_string(),
        };
        if !self.script.withhold_confirmation {
            let _ = sender.send(confirmed.clone());
            if self.script.confirm_twice {
                let _ = sender.send(confirmed);
            }
        }
        if let Some(kind) = &self.script.unrecognized {
            let _ = sender.send(BusEvent::Unrecognized { kind: kind.clone() });
        }
        if let Some(stray) = self.script.stray.clone() {
            let sender = sender.clone();
            tokio::spawn(async move {
                for _ in 0..stray.count {
                    tokio::time::sleep(stray.every).await;
                    let event = BusEvent::message(stray.channel.as_str(), Bytes::new());
                    if sender.send(event).is_err() {
                        break;
                    }
                }
            });
        }

        let mut state = self.state.lock();
        state.ops.push(Op::Subscribe(topic.to_string()));
        if !self.script.drop_after_confirmation {
            state.inboxes.insert(topic.to_string(), sender);
        }

        Ok(ScriptedSubscription {
            topic: topic.to_string(),
            receiver,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, TransportError> {
        if self.script.fail_publish {
            return Err(TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.ops.push(Op::Publish {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        let Ok(envelope) = RequestEnvelope::decode(&payload) else {
            return Ok(0);
        };
        let Some(inbox) = state.inboxes.get(&envelope.reply_to) else {
            return Ok(0);
        };

        let reply_to = envelope.reply_to.as_str();
        let mut replies = Vec::new();
        for (channel, body) in &self.script.foreign_replies {
            replies.push(BusEvent::message(channel.as_str(), body.clone()));
        }
        if self.script.echo_request {
            replies.push(BusEvent::message(reply_to, envelope.payload.clone()));
        }
        for body in &self.script.replies {
            replies.push(BusEvent::message(reply_to, body.clone()));
        }
        for reply in replies {
            let _ = inbox.send(reply);
        }
        Ok(1)
    }
}

/// Subscription handed out by [`ScriptedTransport`].
pub struct ScriptedSubscription {
    topic: String,
    receiver: mpsc::UnboundedReceiver<BusEvent>,
    state: Arc<Mutex<ScriptState>>,
    closed: bool,
}

#[async_trait]
impl BusSubscription for ScriptedSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn receive(&mut self, timeout: Duration) -> Result<BusEvent, TransportError> {
        if self.closed {
            return Err(TransportError::Closed {
                topic: self.topic.clone(),
            });
        }

        let event = match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(TransportError::Closed {
                    topic: self.topic.clone(),
                })
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    topic: self.topic.clone(),
                    after: timeout,
                })
            }
        };

        let op = match &event {
            BusEvent::Confirmed { topic } => Some(Op::Confirmed(topic.clone())),
            BusEvent::Message { channel, .. } => Some(Op::Delivered(channel.clone())),
            BusEvent::Unrecognized { .. } => None,
        };
        if let Some(op) = op {
            self.state.lock().ops.push(op);
        }
        Ok(event)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.receiver.close();
        let mut state = self.state.lock();
        state.inboxes.remove(&self.topic);
        state.ops.push(Op::Close(self.topic.clone()));
    }
}

impl Drop for ScriptedSubscription {
    fn drop(&mut self) {
        if !self.closed {
            self.state.lock().inboxes.remove(&self.topic);
        }
    }
}
