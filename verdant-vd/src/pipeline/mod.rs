//! Discovery ingest pipeline
//!
//! Orchestrates normalize → score → match → store for each raw scrape
//! record. Normalizer and matcher failures are handled locally (the record
//! is dropped or defaulted); they never abort the batch.

pub mod matcher;
pub mod normalizer;
pub mod scorer;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;
use verdant_common::events::{EventBus, VenueEvent};

use crate::db::{self, StoreError};
use crate::models::{DiscoveredVenue, DiscoveredVenueCandidate, ScrapeRecord, VenueStatus};
use matcher::MatchDecision;
use scorer::ScoreSignals;

/// Per-record result of an ingest batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Stored as a new discovered venue
    Stored {
        venue_id: Uuid,
        confidence_score: i64,
    },
    /// Merged into an existing record (same physical venue, new platform)
    Merged { venue_id: Uuid },
    /// Stored as a new sibling location of a known chain
    LinkedToChain {
        venue_id: Uuid,
        chain_id: Uuid,
        confidence_score: i64,
    },
    /// Dropped before scoring (malformed)
    Dropped { error: String },
}

/// Run one raw scrape record through the full pipeline.
pub async fn ingest_record(
    pool: &SqlitePool,
    event_bus: &EventBus,
    fallback_sku: &str,
    strategy_id: &str,
    query: &str,
    record: ScrapeRecord,
) -> Result<IngestOutcome, StoreError> {
    let candidate = match normalizer::normalize(record, fallback_sku) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(strategy_id, query, error = %e, "dropping malformed candidate");
            return Ok(IngestOutcome::Dropped {
                error: e.to_string(),
            });
        }
    };

    let (decision, context) = matcher::classify(pool, &candidate).await?;

    match decision {
        MatchDecision::MergeIntoExisting { venue_id } => {
            let merged = db::discovered_venues::merge_candidate(pool, venue_id, &candidate).await?;
            info!(
                venue_id = %venue_id,
                platforms = merged.delivery_platforms.len(),
                "merged re-scraped candidate into existing venue"
            );
            if let Some(link) = candidate.delivery_platforms.first() {
                event_bus.emit_lossy(VenueEvent::VenueMerged {
                    venue_id,
                    platform: link.platform.as_str().to_string(),
                    timestamp: Utc::now(),
                });
            }
            Ok(IngestOutcome::Merged { venue_id })
        }
        MatchDecision::LinkAsChainSibling {
            chain_id,
            chain_name,
        } => {
            let signals = ScoreSignals {
                near_duplicate_exists: context.production_duplicate,
                chain_name_match: context.exact_chain_match,
            };
            let (score, factors) = scorer::score_candidate(&candidate, signals);
            let mut venue = build_venue(candidate, score, factors, strategy_id, query);
            venue.is_chain = true;
            venue.chain_id = Some(chain_id);
            venue.chain_name = Some(chain_name.clone());

            db::discovered_venues::insert_venue(pool, &venue).await?;
            let mean =
                db::discovered_venues::recompute_chain_confidence(pool, chain_id).await?;
            info!(
                venue_id = %venue.id,
                chain_id = %chain_id,
                chain_confidence = mean,
                "linked candidate as chain sibling"
            );
            event_bus.emit_lossy(VenueEvent::ChainSiblingLinked {
                venue_id: venue.id,
                chain_id,
                chain_name,
                timestamp: Utc::now(),
            });
            Ok(IngestOutcome::LinkedToChain {
                venue_id: venue.id,
                chain_id,
                confidence_score: score,
            })
        }
        MatchDecision::NewVenue => {
            let signals = ScoreSignals {
                near_duplicate_exists: context.production_duplicate,
                chain_name_match: false,
            };
            let (score, factors) = scorer::score_candidate(&candidate, signals);
            let venue = build_venue(candidate, score, factors, strategy_id, query);

            db::discovered_venues::insert_venue(pool, &venue).await?;
            info!(
                venue_id = %venue.id,
                name = %venue.name,
                confidence_score = score,
                "stored new discovered venue"
            );
            event_bus.emit_lossy(VenueEvent::VenueDiscovered {
                venue_id: venue.id,
                name: venue.name.clone(),
                country: venue.address.country.clone(),
                confidence_score: score,
                timestamp: Utc::now(),
            });
            Ok(IngestOutcome::Stored {
                venue_id: venue.id,
                confidence_score: score,
            })
        }
    }
}

fn build_venue(
    candidate: DiscoveredVenueCandidate,
    score: i64,
    factors: Vec<crate::models::ConfidenceFactor>,
    strategy_id: &str,
    query: &str,
) -> DiscoveredVenue {
    let now = Utc::now();
    DiscoveredVenue {
        id: Uuid::new_v4(),
        name: candidate.name,
        address: candidate.address,
        coordinates: candidate.coordinates,
        is_chain: false,
        chain_id: None,
        chain_name: None,
        chain_confidence: None,
        delivery_platforms: candidate.delivery_platforms,
        planted_products: candidate.planted_products,
        dishes: candidate.dishes,
        confidence_score: score,
        confidence_factors: factors,
        status: VenueStatus::Discovered,
        rejection_reason: None,
        production_venue_id: None,
        discovered_by_strategy_id: strategy_id.to_string(),
        discovered_by_query: query.to_string(),
        created_at: now,
        verified_at: None,
        last_seen_at: now,
    }
}
