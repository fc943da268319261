//! Health Check API Handler
//!
//! Reports queue depth and what the pipeline runner is doing.

use axum::{Json, extract::State};
use podswap_core::RunnerStatus;
use serde::Serialize;

use crate::api::AppState;

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub queued: usize,
    pub capacity: usize,
    pub runner: RunnerStatus,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let runner = state.runner.borrow().clone();
    Json(HealthReport {
        status: "ok",
        queued: state.queue.queued(),
        capacity: state.queue.capacity(),
        runner,
    })
}
