//! Promotion writer
//!
//! Materializes a verified discovered venue into the production
//! Venue/Dish tables. Retry-safe by construction: the production venue is
//! looked up by its natural key (name, city, country) before creation, and
//! dishes reconcile per-name, so a retried or raced promotion never
//! duplicates records. The discovered venue is only marked `promoted`
//! after all production writes succeed; any earlier failure leaves it
//! `verified` for a clean retry.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use verdant_common::events::{EventBus, VenueEvent};

use crate::db::{self, audit, StoreError};
use crate::models::{Dish, Venue, VenueStatus};

/// Reason recorded on every audit entry this writer produces
const PROMOTION_REASON: &str = "promoted from discovery pipeline";

#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("discovered venue not found: {0}")]
    NotFound(Uuid),

    #[error("cannot promote venue {id} in status {status}")]
    InvalidStatus { id: Uuid, status: &'static str },

    /// Production-store write failed; the discovered venue stays verified
    #[error("production store write failed: {0}")]
    ProductionWrite(String),
}

impl From<PromoteError> for crate::error::ApiError {
    fn from(err: PromoteError) -> Self {
        match err {
            PromoteError::NotFound(id) => {
                crate::error::ApiError::NotFound(format!("discovered venue not found: {}", id))
            }
            PromoteError::InvalidStatus { .. } => {
                crate::error::ApiError::Conflict(err.to_string())
            }
            PromoteError::ProductionWrite(msg) => crate::error::ApiError::PromotionFailure(msg),
        }
    }
}

fn production_error(err: StoreError) -> PromoteError {
    PromoteError::ProductionWrite(err.to_string())
}

/// Promote a verified discovered venue. Returns the production venue id.
///
/// Idempotent: promoting an already-promoted venue returns its existing
/// production link without touching the production store again.
pub async fn promote(
    pool: &SqlitePool,
    event_bus: &EventBus,
    id: Uuid,
) -> Result<Uuid, PromoteError> {
    let discovered = db::discovered_venues::load_venue(pool, id)
        .await
        .map_err(production_error)?
        .ok_or(PromoteError::NotFound(id))?;

    match discovered.status {
        VenueStatus::Verified => {}
        VenueStatus::Promoted => {
            if let Some(production_id) = discovered.production_venue_id {
                return Ok(production_id);
            }
            // Unreachable when invariants hold; fall through as a conflict
            return Err(PromoteError::InvalidStatus {
                id,
                status: "promoted",
            });
        }
        other => {
            return Err(PromoteError::InvalidStatus {
                id,
                status: other.as_str(),
            })
        }
    }

    // Natural-key lookup makes the venue write retry-safe
    let existing = db::venues::find_by_name_city(
        pool,
        &discovered.name,
        &discovered.address.city,
        &discovered.address.country,
    )
    .await
    .map_err(production_error)?;

    let production_venue = match existing {
        Some(venue) => {
            db::venues::touch_last_verified(pool, venue.id)
                .await
                .map_err(production_error)?;
            info!(
                discovered_id = %id,
                production_id = %venue.id,
                "production venue already exists, linking"
            );
            venue
        }
        None => {
            let venue = Venue {
                id: Uuid::new_v4(),
                name: discovered.name.clone(),
                address: discovered.address.clone(),
                coordinates: discovered.coordinates,
                delivery_platforms: discovered.delivery_platforms.clone(),
                status: "active".to_string(),
                discovered_venue_id: Some(id),
                created_at: Utc::now(),
                last_verified: Utc::now(),
            };
            db::venues::create_venue(pool, &venue)
                .await
                .map_err(production_error)?;

            audit::record(
                pool,
                "create",
                "venues",
                &venue.id.to_string(),
                &[audit::ChangeEntry {
                    field: "venue".to_string(),
                    old: serde_json::Value::Null,
                    new: serde_json::to_value(&venue)
                        .map_err(|e| PromoteError::ProductionWrite(e.to_string()))?,
                }],
                PROMOTION_REASON,
            )
            .await
            .map_err(production_error)?;

            info!(
                discovered_id = %id,
                production_id = %venue.id,
                "created production venue"
            );
            venue
        }
    };

    reconcile_dishes(pool, &discovered, production_venue.id)
        .await
        .map_err(production_error)?;

    // All production writes done; flip the status last
    db::discovered_venues::mark_promoted(pool, id, production_venue.id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(msg) => PromoteError::ProductionWrite(msg),
            other => production_error(other),
        })?;

    event_bus.emit_lossy(VenueEvent::VenuePromoted {
        venue_id: id,
        production_venue_id: production_venue.id,
        timestamp: Utc::now(),
    });

    Ok(production_venue.id)
}

/// Per-dish reconcile: match existing production dishes by case-insensitive
/// name; update mutable fields only when they differ, create the rest.
async fn reconcile_dishes(
    pool: &SqlitePool,
    discovered: &crate::models::DiscoveredVenue,
    production_venue_id: Uuid,
) -> Result<(), StoreError> {
    let existing = db::dishes::get_by_venue(pool, production_venue_id).await?;

    for candidate in &discovered.dishes {
        let candidate_key = db::normalize_key(&candidate.name);
        let matched = existing
            .iter()
            .find(|dish| db::normalize_key(&dish.name) == candidate_key);

        match matched {
            Some(dish) => {
                let price_changed =
                    candidate.price.is_some() && candidate.price != dish.price;
                let description_changed = candidate.description.is_some()
                    && candidate.description != dish.description;

                if price_changed || description_changed {
                    let new_price = candidate.price.as_deref().or(dish.price.as_deref());
                    let new_description = candidate
                        .description
                        .as_deref()
                        .or(dish.description.as_deref());

                    db::dishes::update_mutable(
                        pool,
                        dish.id,
                        new_price,
                        new_description,
                        dish.image_url.as_deref(),
                    )
                    .await?;

                    let mut changes = Vec::new();
                    if price_changed {
                        changes.push(audit::ChangeEntry {
                            field: "price".to_string(),
                            old: serde_json::to_value(&dish.price)?,
                            new: serde_json::to_value(&candidate.price)?,
                        });
                    }
                    if description_changed {
                        changes.push(audit::ChangeEntry {
                            field: "description".to_string(),
                            old: serde_json::to_value(&dish.description)?,
                            new: serde_json::to_value(&candidate.description)?,
                        });
                    }
                    audit::record(
                        pool,
                        "update",
                        "dishes",
                        &dish.id.to_string(),
                        &changes,
                        PROMOTION_REASON,
                    )
                    .await?;
                }
            }
            None => {
                let dish = Dish {
                    id: Uuid::new_v4(),
                    venue_id: production_venue_id,
                    name: candidate.name.clone(),
                    price: candidate.price.clone(),
                    product: candidate.product.clone(),
                    description: candidate.description.clone(),
                    image_url: None,
                    created_at: Utc::now(),
                };
                db::dishes::create_dish(pool, &dish).await?;

                audit::record(
                    pool,
                    "create",
                    "dishes",
                    &dish.id.to_string(),
                    &[audit::ChangeEntry {
                        field: "dish".to_string(),
                        old: serde_json::Value::Null,
                        new: serde_json::to_value(&dish)?,
                    }],
                    PROMOTION_REASON,
                )
                .await?;
            }
        }
    }

    Ok(())
}
