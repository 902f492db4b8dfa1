//! Review queue statistics endpoint

use axum::extract::State;
use axum::Json;

use crate::db::{self, discovered_venues::ReviewStats};
use crate::error::ApiResult;
use crate::AppState;

/// GET /discovered-venues/stats
pub async fn review_stats(State(state): State<AppState>) -> ApiResult<Json<ReviewStats>> {
    let stats = db::discovered_venues::stats(&state.db).await?;
    Ok(Json(stats))
}
