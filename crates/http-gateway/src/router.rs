//! HTTP routes.
//!
//! | Route | Destination topic | Request payload |
//! | --- | --- | --- |
//! | `POST /{service}` | `{service}` | [`ForwardPayload`] JSON |
//! | `GET /` | `html:{Host}` | empty |
//! | `GET /health` | none | none |
//!
//! Engine failures are logged and answered with `503 Unreachable Service`;
//! transport detail never reaches the client.

use crate::domain::payload::{encode_reply, ForwardPayload, UNREACHABLE_SERVICE};
use crate::middleware::TracingLayer;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use request_engine::RequestEngine;
use shared_bus::BusTransport;
use tracing::{error, warn};

/// Topic prefix for page requests.
pub const HTML_TOPIC_PREFIX: &str = "html:";

const TEXT_HTML: &str = "text/html";

/// Application state shared across handlers
pub struct AppState<T: BusTransport> {
    pub engine: RequestEngine<T>,
}

impl<T: BusTransport> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

/// Build the gateway router over `engine`.
pub fn router<T: BusTransport>(engine: RequestEngine<T>) -> Router {
    Router::new()
        .route("/", get(handle_page::<T>))
        .route("/health", get(handle_health::<T>))
        .route("/:service", post(handle_forward::<T>))
        .layer(TracingLayer::new())
        .with_state(AppState { engine })
}

/// Forward a request body to the `service` topic.
async fn handle_forward<T: BusTransport>(
    State(state): State<AppState<T>>,
    Path(service): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let payload = match ForwardPayload::new(content_type, body).to_bytes() {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to encode forwarded request");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.engine.call(&service, payload).await {
        Ok(reply) => (StatusCode::OK, Json(encode_reply(&reply))).into_response(),
        Err(e) => {
            warn!(service = %service, error = %e, "Service call failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(encode_reply(UNREACHABLE_SERVICE.as_bytes())),
            )
                .into_response()
        }
    }
}

/// Ask the `html:{Host}` topic for a page.
///
/// HTTP/2 clients send `:authority` instead of `Host`; it is used when the
/// header is absent.
async fn handle_page<T: BusTransport>(
    State(state): State<AppState<T>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    let Some(host) = host else {
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    };
    let destination = format!("{HTML_TOPIC_PREFIX}{host}");

    match state.engine.call(&destination, Bytes::new()).await {
        Ok(page) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_HTML)], page).into_response(),
        Err(e) => {
            warn!(destination = %destination, error = %e, "Page request failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, TEXT_HTML)],
                UNREACHABLE_SERVICE,
            )
                .into_response()
        }
    }
}

async fn handle_health<T: BusTransport>(State(state): State<AppState<T>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "calls": state.engine.stats().snapshot(),
    }))
}
