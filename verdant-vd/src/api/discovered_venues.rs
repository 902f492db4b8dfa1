//! Review queue endpoints: list, inspect, verify, reject, promote
//!
//! Single-venue actions map store errors straight to HTTP statuses. Bulk
//! actions never abort on one bad id: each venue is processed on its own
//! and failures come back per-id alongside the successes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;
use verdant_common::events::VenueEvent;

use crate::db::{self, StoreError};
use crate::error::{ApiError, ApiResult};
use crate::models::{DiscoveredVenue, ReviewFilter, VenueUpdate};
use crate::{promotion, AppState};

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub venues: Vec<DiscoveredVenue>,
    pub total: i64,
}

/// GET /discovered-venues
pub async fn list_venues(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> ApiResult<Json<ListResponse>> {
    let (venues, total) = db::discovered_venues::list_venues(&state.db, &filter).await?;
    Ok(Json(ListResponse { venues, total }))
}

/// GET /discovered-venues/:id
pub async fn get_venue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DiscoveredVenue>> {
    let venue = db::discovered_venues::load_venue(&state.db, id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("discovered venue not found: {}", id)))?;
    Ok(Json(venue))
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub updates: Option<VenueUpdate>,
}

/// Response envelope for single-venue review actions, carrying the
/// updated record alongside the outcome.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub venue: DiscoveredVenue,
}

/// Run the promotion writer for a freshly verified venue when the
/// `auto_promote` flag is set. A promotion failure is logged and left for
/// a manual retry; the venue stays verified either way. Returns true when
/// the venue was promoted.
async fn auto_promote(state: &AppState, id: Uuid) -> bool {
    if !state.config.auto_promote {
        return false;
    }
    match promotion::promote(&state.db, &state.event_bus, id).await {
        Ok(production_id) => {
            info!(venue_id = %id, production_id = %production_id, "auto-promoted");
            true
        }
        Err(e) => {
            // Verified state stands; promotion can be retried
            error!(venue_id = %id, error = %e, "auto-promotion failed");
            false
        }
    }
}

/// POST /discovered-venues/:id/verify
///
/// Optional field updates apply atomically with the status change. With
/// auto-promote enabled, a fresh verification also runs the promotion
/// writer; a promotion failure leaves the venue verified and is reported
/// without undoing the verify.
pub async fn verify_venue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<VerifyRequest>>,
) -> ApiResult<Json<ActionResponse>> {
    let updates = body
        .and_then(|Json(req)| req.updates)
        .unwrap_or_default();

    let (mut venue, applied) =
        db::discovered_venues::verify_venue(&state.db, id, &updates, false).await?;

    if applied {
        info!(venue_id = %id, "venue verified");
        state.event_bus.emit_lossy(VenueEvent::VenueVerified {
            venue_id: id,
            timestamp: Utc::now(),
        });

        if auto_promote(&state, id).await {
            if let Some(reloaded) = db::discovered_venues::load_venue(&state.db, id).await? {
                venue = reloaded;
            }
        }
    }

    let message = if applied {
        "venue verified".to_string()
    } else {
        "venue already verified".to_string()
    };
    Ok(Json(ActionResponse {
        success: true,
        message,
        venue,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// POST /discovered-venues/:id/reject
pub async fn reject_venue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let venue = db::discovered_venues::reject_venue(&state.db, id, &req.reason).await?;

    info!(venue_id = %id, reason = %req.reason.trim(), "venue rejected");
    state.event_bus.emit_lossy(VenueEvent::VenueRejected {
        venue_id: id,
        reason: req.reason.trim().to_string(),
        timestamp: Utc::now(),
    });

    Ok(Json(ActionResponse {
        success: true,
        message: "venue rejected".to_string(),
        venue,
    }))
}

/// POST /discovered-venues/:id/update-and-verify
///
/// Same as verify, but demands at least one actually changed field; a
/// no-op update body is a validation error.
pub async fn update_and_verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(updates): Json<VenueUpdate>,
) -> ApiResult<Json<ActionResponse>> {
    if updates.is_empty() {
        return Err(ApiError::Validation(
            "update-and-verify requires a non-empty update".to_string(),
        ));
    }

    let (mut venue, applied) =
        db::discovered_venues::verify_venue(&state.db, id, &updates, true).await?;

    if applied {
        info!(venue_id = %id, "venue updated and verified");
        state.event_bus.emit_lossy(VenueEvent::VenueVerified {
            venue_id: id,
            timestamp: Utc::now(),
        });

        if auto_promote(&state, id).await {
            if let Some(reloaded) = db::discovered_venues::load_venue(&state.db, id).await? {
                venue = reloaded;
            }
        }
    }

    Ok(Json(ActionResponse {
        success: true,
        message: "venue updated and verified".to_string(),
        venue,
    }))
}

/// POST /discovered-venues/:id/promote
pub async fn promote_venue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let production_id = promotion::promote(&state.db, &state.event_bus, id).await?;
    Ok(Json(json!({
        "venue_id": id,
        "production_venue_id": production_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BulkVerifyRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRejectRequest {
    pub ids: Vec<Uuid>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkVerifyResponse {
    pub success: bool,
    pub verified: usize,
    pub failures: Vec<BulkFailure>,
}

#[derive(Debug, Serialize)]
pub struct BulkRejectResponse {
    pub success: bool,
    pub rejected: usize,
    pub failures: Vec<BulkFailure>,
}

/// POST /discovered-venues/bulk-verify
pub async fn bulk_verify(
    State(state): State<AppState>,
    Json(req): Json<BulkVerifyRequest>,
) -> ApiResult<Json<BulkVerifyResponse>> {
    if req.ids.is_empty() {
        return Err(ApiError::Validation("ids must not be empty".to_string()));
    }

    let empty = VenueUpdate::default();
    let mut verified = 0;
    let mut failures = Vec::new();

    for id in req.ids {
        if state.shutdown.is_cancelled() {
            break;
        }
        match db::discovered_venues::verify_venue(&state.db, id, &empty, false).await {
            Ok((_, applied)) => {
                verified += 1;
                if applied {
                    state.event_bus.emit_lossy(VenueEvent::VenueVerified {
                        venue_id: id,
                        timestamp: Utc::now(),
                    });
                    auto_promote(&state, id).await;
                }
            }
            Err(e) => {
                warn!(venue_id = %id, error = %e, "bulk verify: skipping venue");
                failures.push(BulkFailure {
                    id,
                    error: bulk_error(e),
                });
            }
        }
    }

    Ok(Json(BulkVerifyResponse {
        success: true,
        verified,
        failures,
    }))
}

/// POST /discovered-venues/bulk-reject
pub async fn bulk_reject(
    State(state): State<AppState>,
    Json(req): Json<BulkRejectRequest>,
) -> ApiResult<Json<BulkRejectResponse>> {
    if req.ids.is_empty() {
        return Err(ApiError::Validation("ids must not be empty".to_string()));
    }
    if req.reason.trim().is_empty() {
        return Err(ApiError::Validation(
            "rejection reason must not be empty".to_string(),
        ));
    }

    let mut rejected = 0;
    let mut failures = Vec::new();

    for id in req.ids {
        if state.shutdown.is_cancelled() {
            break;
        }
        match db::discovered_venues::reject_venue(&state.db, id, &req.reason).await {
            Ok(_) => {
                rejected += 1;
                state.event_bus.emit_lossy(VenueEvent::VenueRejected {
                    venue_id: id,
                    reason: req.reason.trim().to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(venue_id = %id, error = %e, "bulk reject: skipping venue");
                failures.push(BulkFailure {
                    id,
                    error: bulk_error(e),
                });
            }
        }
    }

    Ok(Json(BulkRejectResponse {
        success: true,
        rejected,
        failures,
    }))
}

fn bulk_error(err: StoreError) -> String {
    match err {
        StoreError::NotFound(msg) => msg,
        StoreError::Conflict(msg) => msg,
        StoreError::Validation(msg) => msg,
        other => other.to_string(),
    }
}
