//! Built-in routes: welcome and health checks.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub ok: bool,
    pub message: &'static str,
}

/// Liveness report.
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub ok: bool,
    pub status: &'static str,
    /// Seconds since the server started
    pub uptime: f64,
    /// RFC 3339 timestamp of the report
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ok: bool,
    pub status: &'static str,
}

pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        ok: true,
        message: "Welcome to the portfolio API",
    })
}

/// Liveness check.
pub async fn live(State(state): State<Arc<AppState>>) -> Json<LiveResponse> {
    Json(LiveResponse {
        ok: true,
        status: "live",
        uptime: state.started_at.elapsed().as_secs_f64(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check. The gate has no backing store, so being up is enough.
pub async fn ready() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ok: true,
        status: "ready",
    })
}
