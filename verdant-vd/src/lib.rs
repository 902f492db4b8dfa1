//! Verdant Venue Discovery service
//!
//! Review pipeline between raw delivery-platform scrapes and the curated
//! production venue directory. Ingests scraped candidates, normalizes and
//! scores them, queues them for human review, and promotes verified venues
//! into the production store.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod promotion;
pub mod sweep;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use verdant_common::events::EventBus;

use config::ServiceConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub config: Arc<ServiceConfig>,
    pub startup_time: DateTime<Utc>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: ServiceConfig) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            startup_time: Utc::now(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/events", get(api::sse::event_stream))
        .route("/ingest/candidates", post(api::ingest::ingest_candidates))
        .route("/sweep/stale", post(api::ingest::trigger_stale_sweep))
        .route(
            "/discovered-venues",
            get(api::discovered_venues::list_venues),
        )
        .route("/discovered-venues/stats", get(api::stats::review_stats))
        .route(
            "/discovered-venues/bulk-verify",
            post(api::discovered_venues::bulk_verify),
        )
        .route(
            "/discovered-venues/bulk-reject",
            post(api::discovered_venues::bulk_reject),
        )
        .route(
            "/discovered-venues/:id",
            get(api::discovered_venues::get_venue),
        )
        .route(
            "/discovered-venues/:id/verify",
            post(api::discovered_venues::verify_venue),
        )
        .route(
            "/discovered-venues/:id/reject",
            post(api::discovered_venues::reject_venue),
        )
        .route(
            "/discovered-venues/:id/update-and-verify",
            post(api::discovered_venues::update_and_verify),
        )
        .route(
            "/discovered-venues/:id/promote",
            post(api::discovered_venues::promote_venue),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
