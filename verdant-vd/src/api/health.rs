//! Health check endpoint

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = (Utc::now() - state.startup_time).num_seconds();
    Json(json!({
        "status": "ok",
        "module": "verdant-vd",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
    }))
}
