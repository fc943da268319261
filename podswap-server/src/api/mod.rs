//! API Module
//!
//! HTTP layer of the service: the webhook receiver and a health endpoint.

pub mod error;
pub mod health;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use podswap_core::RunnerStatus;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::queue::TriggerSender;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// HMAC key for webhook signatures, empty when no secret is configured
    pub secret: Arc<[u8]>,
    pub queue: TriggerSender,
    pub runner: watch::Receiver<RunnerStatus>,
}

impl AppState {
    pub fn new(
        secret: impl AsRef<[u8]>,
        queue: TriggerSender,
        runner: watch::Receiver<RunnerStatus>,
    ) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            queue,
            runner,
        }
    }
}

/// Create the router with the webhook mounted at `webhook_path`
pub fn create_router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route(health::HEALTH_PATH, get(health::health_check))
        .route(webhook_path, post(webhook::receive_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
