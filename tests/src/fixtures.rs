//! Responders: services that answer requests published on a topic.

use bytes::Bytes;
use request_engine::RequestEnvelope;
use shared_bus::{BusEvent, BusSubscription, BusTransport, InMemoryBus, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Subscribe to `topic` and answer every request with the replies `handler`
/// returns, in order.
///
/// The subscription is live when this returns. The task ends when the bus
/// shuts down or the handle is aborted.
pub async fn spawn_responder<F>(bus: &Arc<InMemoryBus>, topic: &str, handler: F) -> JoinHandle<()>
where
    F: Fn(Bytes) -> Vec<Bytes> + Send + 'static,
{
    let mut subscription = bus.subscribe(topic).await.unwrap();
    let bus = Arc::clone(bus);

    tokio::spawn(async move {
        loop {
            let event = match subscription.receive(IDLE_WAIT).await {
                Ok(event) => event,
                Err(TransportError::Timeout { .. }) => continue,
                Err(_) => break,
            };
            let BusEvent::Message { payload, .. } = event else {
                continue;
            };
            let Ok(request) = RequestEnvelope::decode(&payload) else {
                debug!("Responder ignoring malformed request");
                continue;
            };
            for reply in handler(request.payload) {
                let _ = bus.publish(&request.reply_to, reply).await;
            }
        }
    })
}

/// Responder answering with the upper-cased request.
pub async fn spawn_upper(bus: &Arc<InMemoryBus>, topic: &str) -> JoinHandle<()> {
    spawn_responder(bus, topic, |request| {
        vec![Bytes::from(request.to_ascii_uppercase())]
    })
    .await
}
