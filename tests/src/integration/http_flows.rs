//! # HTTP Flows
//!
//! The gateway router over the in-memory bus, driven in-process with
//! `tower::ServiceExt::oneshot`:
//!
//! 1. **POST /{service}**: JSON-wrapped body out, base64 JSON string back
//! 2. **GET /**: page fetched from the `html:{Host}` topic
//! 3. **Unreachable**: `503` once the receive bound elapses

#[cfg(test)]
mod tests {
    use crate::fixtures::spawn_responder;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use http_gateway::{ForwardPayload, GatewayConfig, GatewayService};
    use shared_bus::InMemoryBus;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(bus: &Arc<InMemoryBus>) -> Router {
        let mut config = GatewayConfig::default();
        config.engine.receive_timeout = Duration::from_millis(200);
        GatewayService::new(config, Arc::clone(bus)).unwrap().router()
    }

    async fn json_string(body: Body) -> String {
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_round_trip() {
        let bus = Arc::new(InMemoryBus::new());
        let _svc = spawn_responder(&bus, "upper", |payload| {
            let request = ForwardPayload::from_slice(&payload).unwrap();
            assert_eq!(request.content_type, "text/plain");
            vec![Bytes::from(request.body.to_ascii_uppercase())]
        })
        .await;

        let response = app(&bus)
            .oneshot(
                Request::post("/upper")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let encoded = json_string(response.into_body()).await;
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"HELLO");
        assert_eq!(bus.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_post_binary_body() {
        let bus = Arc::new(InMemoryBus::new());
        let _svc = spawn_responder(&bus, "reverse", |payload| {
            let request = ForwardPayload::from_slice(&payload).unwrap();
            let mut body = request.body.to_vec();
            body.reverse();
            vec![Bytes::from(body)]
        })
        .await;

        let response = app(&bus)
            .oneshot(
                Request::post("/reverse")
                    .body(Body::from(vec![0u8, 159, 146, 150]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let encoded = json_string(response.into_body()).await;
        assert_eq!(STANDARD.decode(encoded).unwrap(), vec![150u8, 146, 159, 0]);
    }

    #[tokio::test]
    async fn test_post_unreachable_service() {
        let bus = Arc::new(InMemoryBus::new());

        let response = app(&bus)
            .oneshot(Request::post("/nobody").body(Body::from("x")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let encoded = json_string(response.into_body()).await;
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"Unreachable Service");
        assert_eq!(bus.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_get_page_by_host() {
        let bus = Arc::new(InMemoryBus::new());
        let _site = spawn_responder(&bus, "html:example.com", |payload| {
            assert!(payload.is_empty());
            vec![Bytes::from_static(b"<html>example</html>")]
        })
        .await;

        let response = app(&bus)
            .oneshot(
                Request::get("/")
                    .header(header::HOST, "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<html>example</html>");
    }

    #[tokio::test]
    async fn test_get_page_unknown_host() {
        let bus = Arc::new(InMemoryBus::new());
        let _site = spawn_responder(&bus, "html:example.com", |_| {
            vec![Bytes::from_static(b"<html>example</html>")]
        })
        .await;

        let response = app(&bus)
            .oneshot(
                Request::get("/")
                    .header(header::HOST, "other.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Unreachable Service");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_http_requests() {
        let bus = Arc::new(InMemoryBus::new());
        let _svc = spawn_responder(&bus, "echo", |payload| {
            let request = ForwardPayload::from_slice(&payload).unwrap();
            vec![request.body]
        })
        .await;
        let app = app(&bus);

        let mut handles = Vec::new();
        for i in 0..20 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                let body = format!("body-{i}");
                let response = app
                    .oneshot(Request::post("/echo").body(Body::from(body.clone())).unwrap())
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                let encoded = json_string(response.into_body()).await;
                assert_eq!(STANDARD.decode(encoded).unwrap(), body.into_bytes());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(bus.active_subscriptions(), 1);
    }
}
