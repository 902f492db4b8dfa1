//! Ingest endpoints: batch candidate intake and the manual stale sweep
//!
//! A batch never fails as a whole: each record gets its own outcome, and a
//! malformed record is reported as dropped alongside the stored ones.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::ScrapeRecord;
use crate::pipeline::{self, IngestOutcome};
use crate::{sweep, AppState};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub strategy_id: String,
    pub query: String,
    pub records: Vec<ScrapeRecord>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub outcomes: Vec<IngestOutcome>,
}

/// POST /ingest/candidates
pub async fn ingest_candidates(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    if req.records.is_empty() {
        return Err(ApiError::Validation("records must not be empty".to_string()));
    }

    let batch_size = req.records.len();
    let mut outcomes = Vec::with_capacity(batch_size);
    for record in req.records {
        let outcome = pipeline::ingest_record(
            &state.db,
            &state.event_bus,
            &state.config.fallback_sku,
            &req.strategy_id,
            &req.query,
            record,
        )
        .await?;
        outcomes.push(outcome);
    }

    info!(
        strategy_id = %req.strategy_id,
        query = %req.query,
        records = batch_size,
        "ingest batch complete"
    );

    Ok(Json(IngestResponse { outcomes }))
}

/// POST /sweep/stale
pub async fn trigger_stale_sweep(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let marked = sweep::mark_stale(
        &state.db,
        &state.event_bus,
        state.config.stale_after_days,
    )
    .await?;

    Ok(Json(json!({ "marked_stale": marked })))
}
