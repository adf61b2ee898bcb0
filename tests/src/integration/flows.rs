//! # Engine Flows
//!
//! The request engine against the in-memory bus with live responders:
//!
//! 1. **Round trip**: request published on the destination, reply on the
//!    per-call topic
//! 2. **No responder**: the call times out and leaves no subscription behind
//! 3. **Isolation**: concurrent calls only see their own replies

#[cfg(test)]
mod tests {
    use crate::fixtures::{spawn_responder, spawn_upper};
    use bytes::Bytes;
    use request_engine::{CallError, EngineConfig, RequestEngine, RequestEnvelope};
    use shared_bus::{BusEvent, BusSubscription, BusTransport, InMemoryBus};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(bus: &Arc<InMemoryBus>) -> RequestEngine<InMemoryBus> {
        RequestEngine::with_config(
            Arc::clone(bus),
            EngineConfig::with_receive_timeout(Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let bus = Arc::new(InMemoryBus::new());
        let _responder = spawn_upper(&bus, "echo").await;

        let reply = engine(&bus)
            .call("echo", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        assert_eq!(&reply[..], b"HI");
        // Only the responder's subscription remains
        assert_eq!(bus.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_each_call_publishes_request_and_reply() {
        let bus = Arc::new(InMemoryBus::new());
        let _responder = spawn_upper(&bus, "echo").await;

        engine(&bus).call("echo", Bytes::from_static(b"a")).await.unwrap();
        engine(&bus).call("echo", Bytes::from_static(b"b")).await.unwrap();

        // Two requests plus two replies
        assert_eq!(bus.messages_published(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_responder_times_out() {
        let bus = Arc::new(InMemoryBus::new());

        let err = engine(&bus)
            .call("ghost", Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(bus.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_first_of_many_replies_wins() {
        let bus = Arc::new(InMemoryBus::new());
        let _responder = spawn_responder(&bus, "chatty", |_| {
            vec![
                Bytes::from_static(b"one"),
                Bytes::from_static(b"two"),
                Bytes::from_static(b"three"),
            ]
        })
        .await;

        let reply = engine(&bus)
            .call("chatty", Bytes::new())
            .await
            .unwrap();

        assert_eq!(&reply[..], b"one");
        assert_eq!(bus.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_responder_on_other_topic_is_not_reached() {
        let bus = Arc::new(InMemoryBus::new());
        let _responder = spawn_upper(&bus, "echo").await;
        let engine = RequestEngine::with_config(
            Arc::clone(&bus),
            EngineConfig::with_receive_timeout(Duration::from_millis(50)),
        );

        let err = engine
            .call("echo2", Bytes::from_static(b"hi"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_shut_down_bus_fails_subscribe() {
        let bus = Arc::new(InMemoryBus::new());
        bus.shutdown();

        let err = engine(&bus)
            .call("echo", Bytes::from_static(b"hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::SubscribeFailed { .. }));
        assert_eq!(bus.messages_published(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_are_isolated() {
        let bus = Arc::new(InMemoryBus::new());
        let _responder = spawn_upper(&bus, "echo").await;
        let engine = engine(&bus);

        let mut handles = Vec::new();
        for i in 0..50 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let reply = engine
                    .call("echo", Bytes::from(format!("request-{i}")))
                    .await
                    .unwrap();
                assert_eq!(reply, Bytes::from(format!("REQUEST-{i}")));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = engine.stats().snapshot();
        assert_eq!(stats.calls, 50);
        assert_eq!(stats.succeeded, 50);
        assert_eq!(bus.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_reply_published_directly_on_reply_topic() {
        let bus = Arc::new(InMemoryBus::new());
        let mut listener = bus.subscribe("direct").await.unwrap();
        let engine = engine(&bus);

        let call = tokio::spawn({
            let engine = engine.clone();
            async move { engine.call("direct", Bytes::from_static(b"ping")).await }
        });

        // Act as a hand-written service
        let request = loop {
            match listener.receive(Duration::from_secs(1)).await.unwrap() {
                BusEvent::Message { payload, .. } => break RequestEnvelope::decode(&payload).unwrap(),
                _ => continue,
            }
        };
        assert_eq!(&request.payload[..], b"ping");
        bus.publish(&request.reply_to, Bytes::from_static(b"pong"))
            .await
            .unwrap();

        assert_eq!(&call.await.unwrap().unwrap()[..], b"pong");
    }
}
