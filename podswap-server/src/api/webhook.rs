//! Webhook API Handler
//!
//! Receives push notifications, authenticates them and queues a pipeline
//! trigger. Every request gets exactly one response:
//! - 400: event type header missing, or body unreadable
//! - 200: event type other than `push` (ignored)
//! - 403: signature does not match the body
//! - 200: push event queued
//! - 503: the runner stopped and nothing can be queued

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use podswap_core::signature;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const PUSH_EVENT: &str = "push";

/// Upper bound on the payload size accepted from the sender
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// POST <webhook path>
///
/// Waits for room in the request queue when it is full, so the response can
/// be delayed under sustained load.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<StatusCode> {
    tracing::info!("Received webhook payload");

    match headers.get(EVENT_HEADER).map(|value| value.as_bytes()) {
        None | Some(b"") => {
            tracing::info!("{} header not found, bad request", EVENT_HEADER);
            return Err(ApiError::MissingEvent);
        }
        Some(event) if event == PUSH_EVENT.as_bytes() => {
            tracing::info!("Push webhook payload received, continuing");
        }
        Some(event) => {
            tracing::info!(
                "Ignoring unhandled webhook event: {}",
                String::from_utf8_lossy(event)
            );
            return Ok(StatusCode::OK);
        }
    }

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::UnreadableBody(e.to_string()))?;

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !signature::verify(&state.secret, &body, provided) {
        tracing::error!(
            "Webhook signature does not match (header: {:?})",
            provided
        );
        return Err(ApiError::SignatureMismatch);
    }

    tracing::info!("Webhook authenticated, queueing pipeline trigger");
    state
        .queue
        .enqueue()
        .await
        .map_err(|_| ApiError::QueueClosed)?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::queue::{self, TriggerReceiver, TriggerSender};
    use axum::Router;
    use axum::http::{Method, Request};
    use podswap_core::RunnerStatus;
    use std::time::Duration;
    use tokio::sync::watch;
    use tower::ServiceExt;

    const SECRET: &str = "It's a Secret to Everybody";
    const BODY: &str = "Hello, World!";
    const SIGNATURE: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    fn app(secret: &str, capacity: usize) -> (Router, TriggerSender, TriggerReceiver) {
        let (tx, rx) = queue::channel(capacity);
        let (_status_tx, status_rx) = watch::channel(RunnerStatus::default());
        let state = AppState::new(secret, tx.clone(), status_rx);
        (create_router(state, "/"), tx, rx)
    }

    fn request(event: Option<&str>, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri("/");
        if let Some(event) = event {
            builder = builder.header(EVENT_HEADER, event);
        }
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(BODY)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_push_is_queued() {
        let (app, tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

        let response = app
            .oneshot(request(Some("push"), Some(SIGNATURE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(tx.queued(), 1);
    }

    #[tokio::test]
    async fn test_invalid_secret_is_forbidden() {
        let (app, tx, _rx) = app("invalid secret", queue::QUEUE_CAPACITY);

        let response = app
            .oneshot(request(Some("push"), Some(SIGNATURE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(tx.queued(), 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_forbidden() {
        let (app, tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

        let response = app.oneshot(request(Some("push"), None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(tx.queued(), 0);
    }

    #[tokio::test]
    async fn test_missing_event_is_bad_request() {
        for signature in [Some(SIGNATURE), Some("sha256=00"), None] {
            let (app, tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

            let response = app.oneshot(request(None, signature)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(tx.queued(), 0);
        }
    }

    #[tokio::test]
    async fn test_empty_event_is_bad_request() {
        let (app, _tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

        let response = app
            .oneshot(request(Some(""), Some(SIGNATURE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let (app, tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);
        let body = vec![b'a'; MAX_BODY_BYTES + 1];
        let signature = signature::sign(SECRET.as_bytes(), &body);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(EVENT_HEADER, PUSH_EVENT)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(tx.queued(), 0);
    }

    #[tokio::test]
    async fn test_other_events_are_ignored() {
        for event in ["asd", "ping", "issues", "Push"] {
            let (app, tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

            let response = app
                .oneshot(request(Some(event), Some("sha256=bad")))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "event {}", event);
            assert_eq!(tx.queued(), 0);
        }
    }

    #[tokio::test]
    async fn test_closed_queue_is_unavailable() {
        let (app, _tx, rx) = app(SECRET, queue::QUEUE_CAPACITY);
        drop(rx);

        let response = app
            .oneshot(request(Some("push"), Some(SIGNATURE)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_full_queue_delays_response() {
        let (app, tx, mut rx) = app(SECRET, 1);
        tx.enqueue().await.unwrap();

        let pending = tokio::spawn(app.oneshot(request(Some("push"), Some(SIGNATURE))));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!pending.is_finished(), "handler should wait for queue space");

        rx.next().await.unwrap();
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(tx.queued(), 1);
    }

    #[tokio::test]
    async fn test_webhook_only_accepts_post() {
        let (app, _tx, _rx) = app(SECRET, queue::QUEUE_CAPACITY);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
