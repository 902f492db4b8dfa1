//! Discovered venue store
//!
//! Owns the review-queue records and their state machine. All status
//! transitions are single compare-and-swap UPDATEs: the WHERE clause
//! asserts the expected current status, and rows_affected = 0 is
//! disambiguated into NotFound, idempotent no-op, or Conflict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{audit, normalize_key, StoreError};
use crate::models::{
    Address, ConfidenceFactor, Coordinates, DiscoveredVenue, DiscoveredVenueCandidate,
    DishCandidate, PlatformLink, ReviewFilter, VenueStatus, VenueUpdate,
};

/// Aggregate statistics over the full store
#[derive(Debug, Clone, Serialize)]
pub struct ReviewStats {
    pub total: i64,
    pub total_discovered: i64,
    pub total_verified: i64,
    pub total_rejected: i64,
    pub total_promoted: i64,
    pub total_stale: i64,
    pub by_country: BTreeMap<String, i64>,
    pub by_platform: BTreeMap<String, i64>,
    pub by_confidence: ConfidenceBucketCounts,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfidenceBucketCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

/// A chain known to the store, with the confidence scores of its siblings
#[derive(Debug, Clone)]
pub struct ChainGroup {
    pub chain_id: Uuid,
    pub chain_name: String,
    pub sibling_scores: Vec<i64>,
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Validation(format!("invalid uuid {}: {}", s, e)))
}

fn row_to_venue(row: &sqlx::sqlite::SqliteRow) -> Result<DiscoveredVenue, StoreError> {
    let id: String = row.get("id");
    let chain_id: Option<String> = row.get("chain_id");
    let production_venue_id: Option<String> = row.get("production_venue_id");
    let status: String = row.get("status");
    let lat: Option<f64> = row.get("lat");
    let lng: Option<f64> = row.get("lng");

    let delivery_platforms: Vec<PlatformLink> =
        serde_json::from_str(row.get::<&str, _>("delivery_platforms"))?;
    let planted_products: Vec<String> =
        serde_json::from_str(row.get::<&str, _>("planted_products"))?;
    let dishes: Vec<DishCandidate> = serde_json::from_str(row.get::<&str, _>("dishes"))?;
    let confidence_factors: Vec<ConfidenceFactor> =
        serde_json::from_str(row.get::<&str, _>("confidence_factors"))?;

    Ok(DiscoveredVenue {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        address: Address {
            street: row.get("street"),
            city: row.get("city"),
            postal_code: row.get("postal_code"),
            country: row.get("country"),
        },
        coordinates: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        },
        is_chain: row.get::<i64, _>("is_chain") != 0,
        chain_id: chain_id.as_deref().map(parse_uuid).transpose()?,
        chain_name: row.get("chain_name"),
        chain_confidence: row.get("chain_confidence"),
        delivery_platforms,
        planted_products,
        dishes,
        confidence_score: row.get("confidence_score"),
        confidence_factors,
        status: VenueStatus::parse(&status)
            .ok_or_else(|| StoreError::Validation(format!("unknown status: {}", status)))?,
        rejection_reason: row.get("rejection_reason"),
        production_venue_id: production_venue_id.as_deref().map(parse_uuid).transpose()?,
        discovered_by_strategy_id: row.get("discovered_by_strategy_id"),
        discovered_by_query: row.get("discovered_by_query"),
        created_at: row.get("created_at"),
        verified_at: row.get("verified_at"),
        last_seen_at: row.get("last_seen_at"),
    })
}

/// Insert a freshly discovered venue (status `discovered`).
pub async fn insert_venue(pool: &SqlitePool, venue: &DiscoveredVenue) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO discovered_venues (
            id, name, name_normalized, street, city, city_normalized, postal_code, country,
            lat, lng, is_chain, chain_id, chain_name, chain_confidence,
            delivery_platforms, planted_products, dishes,
            confidence_score, confidence_factors,
            status, rejection_reason, production_venue_id,
            discovered_by_strategy_id, discovered_by_query,
            created_at, verified_at, last_seen_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(venue.id.to_string())
    .bind(&venue.name)
    .bind(normalize_key(&venue.name))
    .bind(&venue.address.street)
    .bind(&venue.address.city)
    .bind(normalize_key(&venue.address.city))
    .bind(&venue.address.postal_code)
    .bind(&venue.address.country)
    .bind(venue.coordinates.map(|c| c.lat))
    .bind(venue.coordinates.map(|c| c.lng))
    .bind(venue.is_chain as i64)
    .bind(venue.chain_id.map(|id| id.to_string()))
    .bind(&venue.chain_name)
    .bind(venue.chain_confidence)
    .bind(serde_json::to_string(&venue.delivery_platforms)?)
    .bind(serde_json::to_string(&venue.planted_products)?)
    .bind(serde_json::to_string(&venue.dishes)?)
    .bind(venue.confidence_score)
    .bind(serde_json::to_string(&venue.confidence_factors)?)
    .bind(venue.status.as_str())
    .bind(&venue.rejection_reason)
    .bind(venue.production_venue_id.map(|id| id.to_string()))
    .bind(&venue.discovered_by_strategy_id)
    .bind(&venue.discovered_by_query)
    .bind(venue.created_at)
    .bind(venue.verified_at)
    .bind(venue.last_seen_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a discovered venue by id.
pub async fn load_venue(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<Option<DiscoveredVenue>, StoreError> {
    let row = sqlx::query("SELECT * FROM discovered_venues WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_venue).transpose()
}

/// Exact identity lookup: (normalized name, normalized city) within a country.
pub async fn find_exact(
    pool: &SqlitePool,
    name: &str,
    city: &str,
    country: &str,
) -> Result<Option<(Uuid, VenueStatus)>, StoreError> {
    let row = sqlx::query(
        "SELECT id, status FROM discovered_venues
         WHERE name_normalized = ? AND city_normalized = ? AND country = ?
         ORDER BY created_at ASC LIMIT 1",
    )
    .bind(normalize_key(name))
    .bind(normalize_key(city))
    .bind(country)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let status: String = row.get("status");
            Ok(Some((
                parse_uuid(&id)?,
                VenueStatus::parse(&status)
                    .ok_or_else(|| StoreError::Validation(format!("unknown status: {}", status)))?,
            )))
        }
        None => Ok(None),
    }
}

/// Verify a discovered venue, optionally applying field updates atomically
/// with the status change.
///
/// Idempotent: verifying an already-verified venue with no (or identical)
/// updates is a no-op success. `require_change` is set by update-and-verify,
/// which demands at least one actually changed field.
///
/// Returns the resulting record and whether a transition was applied.
pub async fn verify_venue(
    pool: &SqlitePool,
    id: Uuid,
    updates: &VenueUpdate,
    require_change: bool,
) -> Result<(DiscoveredVenue, bool), StoreError> {
    updates.validate().map_err(StoreError::Validation)?;

    let venue = load_venue(pool, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("discovered venue not found: {}", id)))?;

    match venue.status {
        VenueStatus::Verified | VenueStatus::Promoted => {
            // Idempotent re-verify: no-op unless the caller brings new edits
            let mut probe = venue.clone();
            if updates.is_empty() || !updates.apply(&mut probe) {
                return Ok((venue, false));
            }
            Err(StoreError::Conflict(format!(
                "venue {} is already {}; refusing conflicting edits",
                id,
                venue.status.as_str()
            )))
        }
        VenueStatus::Rejected | VenueStatus::Stale => Err(StoreError::Conflict(format!(
            "cannot verify venue {} in status {}",
            id,
            venue.status.as_str()
        ))),
        VenueStatus::Discovered => {
            let mut updated = venue.clone();
            let changed = updates.apply(&mut updated);
            if require_change && !changed {
                return Err(StoreError::Validation(
                    "update-and-verify requires at least one changed field".to_string(),
                ));
            }

            let verified_at = Utc::now();
            let result = sqlx::query(
                r#"
                UPDATE discovered_venues SET
                    name = ?, name_normalized = ?, street = ?, city = ?, city_normalized = ?,
                    postal_code = ?, country = ?, lat = ?, lng = ?,
                    delivery_platforms = ?, planted_products = ?, dishes = ?,
                    status = 'verified', verified_at = ?
                WHERE id = ? AND status = 'discovered'
                "#,
            )
            .bind(&updated.name)
            .bind(normalize_key(&updated.name))
            .bind(&updated.address.street)
            .bind(&updated.address.city)
            .bind(normalize_key(&updated.address.city))
            .bind(&updated.address.postal_code)
            .bind(&updated.address.country)
            .bind(updated.coordinates.map(|c| c.lat))
            .bind(updated.coordinates.map(|c| c.lng))
            .bind(serde_json::to_string(&updated.delivery_platforms)?)
            .bind(serde_json::to_string(&updated.planted_products)?)
            .bind(serde_json::to_string(&updated.dishes)?)
            .bind(verified_at)
            .bind(id.to_string())
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                // Lost the race: someone else transitioned this record first
                let current = load_venue(pool, id).await?.ok_or_else(|| {
                    StoreError::NotFound(format!("discovered venue not found: {}", id))
                })?;
                if current.status == VenueStatus::Verified && !changed {
                    return Ok((current, false));
                }
                return Err(StoreError::Conflict(format!(
                    "venue {} was transitioned concurrently to {}",
                    id,
                    current.status.as_str()
                )));
            }

            updated.status = VenueStatus::Verified;
            updated.verified_at = Some(verified_at);

            let changes = audit::diff_changes(&venue, &updated)?;
            audit::record(
                pool,
                "verify",
                "discovered_venues",
                &id.to_string(),
                &changes,
                "verified by reviewer",
            )
            .await?;

            Ok((updated, true))
        }
    }
}

/// Reject a discovered venue with a required non-empty reason.
pub async fn reject_venue(
    pool: &SqlitePool,
    id: Uuid,
    reason: &str,
) -> Result<DiscoveredVenue, StoreError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(StoreError::Validation(
            "rejection reason must not be empty".to_string(),
        ));
    }

    let venue = load_venue(pool, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("discovered venue not found: {}", id)))?;

    if venue.status != VenueStatus::Discovered {
        return Err(StoreError::Conflict(format!(
            "cannot reject venue {} in status {}",
            id,
            venue.status.as_str()
        )));
    }

    let result = sqlx::query(
        "UPDATE discovered_venues SET status = 'rejected', rejection_reason = ?
         WHERE id = ? AND status = 'discovered'",
    )
    .bind(reason)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = load_venue(pool, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("discovered venue not found: {}", id)))?;
        return Err(StoreError::Conflict(format!(
            "venue {} was transitioned concurrently to {}",
            id,
            current.status.as_str()
        )));
    }

    let mut updated = venue;
    updated.status = VenueStatus::Rejected;
    updated.rejection_reason = Some(reason.to_string());

    audit::record(
        pool,
        "reject",
        "discovered_venues",
        &id.to_string(),
        &[audit::ChangeEntry {
            field: "status".to_string(),
            old: serde_json::json!("discovered"),
            new: serde_json::json!("rejected"),
        }],
        reason,
    )
    .await?;

    Ok(updated)
}

/// Link a verified venue to its production record (verified → promoted).
///
/// Idempotent when already promoted to the same production venue.
pub async fn mark_promoted(
    pool: &SqlitePool,
    id: Uuid,
    production_venue_id: Uuid,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE discovered_venues SET status = 'promoted', production_venue_id = ?
         WHERE id = ? AND status = 'verified'",
    )
    .bind(production_venue_id.to_string())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = load_venue(pool, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("discovered venue not found: {}", id)))?;
        if current.status == VenueStatus::Promoted
            && current.production_venue_id == Some(production_venue_id)
        {
            return Ok(());
        }
        return Err(StoreError::Conflict(format!(
            "cannot promote venue {} in status {}",
            id,
            current.status.as_str()
        )));
    }

    Ok(())
}

/// Staleness sweep: discovered records not re-confirmed since the cutoff
/// become stale. Returns the number of records marked.
pub async fn mark_stale_before(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE discovered_venues SET status = 'stale'
         WHERE status = 'discovered' AND last_seen_at < ?",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Merge a re-scraped candidate into an existing record: add unseen
/// platform links, add dishes new by case-insensitive name, union product
/// SKUs, fill missing coordinates, refresh last_seen_at. Status untouched.
pub async fn merge_candidate(
    pool: &SqlitePool,
    venue_id: Uuid,
    candidate: &DiscoveredVenueCandidate,
) -> Result<DiscoveredVenue, StoreError> {
    let mut venue = load_venue(pool, venue_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("discovered venue not found: {}", venue_id)))?;

    for link in &candidate.delivery_platforms {
        if !venue
            .delivery_platforms
            .iter()
            .any(|existing| existing.platform == link.platform)
        {
            venue.delivery_platforms.push(link.clone());
        }
    }

    for dish in &candidate.dishes {
        let dish_key = normalize_key(&dish.name);
        if !venue
            .dishes
            .iter()
            .any(|existing| normalize_key(&existing.name) == dish_key)
        {
            venue.dishes.push(dish.clone());
        }
    }

    for product in &candidate.planted_products {
        if !venue.planted_products.contains(product) {
            venue.planted_products.push(product.clone());
        }
    }

    if venue.coordinates.is_none() {
        venue.coordinates = candidate.coordinates;
    }

    venue.last_seen_at = Utc::now();

    sqlx::query(
        "UPDATE discovered_venues SET
            delivery_platforms = ?, planted_products = ?, dishes = ?,
            lat = ?, lng = ?, last_seen_at = ?
         WHERE id = ?",
    )
    .bind(serde_json::to_string(&venue.delivery_platforms)?)
    .bind(serde_json::to_string(&venue.planted_products)?)
    .bind(serde_json::to_string(&venue.dishes)?)
    .bind(venue.coordinates.map(|c| c.lat))
    .bind(venue.coordinates.map(|c| c.lng))
    .bind(venue.last_seen_at)
    .bind(venue_id.to_string())
    .execute(pool)
    .await?;

    Ok(venue)
}

/// All chains known in a country, with their sibling confidence scores.
pub async fn chains_in_country(
    pool: &SqlitePool,
    country: &str,
) -> Result<Vec<ChainGroup>, StoreError> {
    let rows = sqlx::query(
        "SELECT chain_id, chain_name, confidence_score FROM discovered_venues
         WHERE country = ? AND chain_id IS NOT NULL AND chain_name IS NOT NULL
         ORDER BY chain_id, created_at",
    )
    .bind(country)
    .fetch_all(pool)
    .await?;

    let mut groups: Vec<ChainGroup> = Vec::new();
    for row in rows {
        let chain_id: String = row.get("chain_id");
        let chain_id = parse_uuid(&chain_id)?;
        let chain_name: String = row.get("chain_name");
        let score: i64 = row.get("confidence_score");

        match groups.iter_mut().find(|g| g.chain_id == chain_id) {
            Some(group) => group.sibling_scores.push(score),
            None => groups.push(ChainGroup {
                chain_id,
                chain_name,
                sibling_scores: vec![score],
            }),
        }
    }

    Ok(groups)
}

/// Recompute chain confidence as the mean of all current sibling scores
/// (scaled to 0-1) and write it to every sibling. Full recompute on every
/// link avoids running-mean drift.
pub async fn recompute_chain_confidence(
    pool: &SqlitePool,
    chain_id: Uuid,
) -> Result<f64, StoreError> {
    let rows = sqlx::query(
        "SELECT confidence_score FROM discovered_venues WHERE chain_id = ?",
    )
    .bind(chain_id.to_string())
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(0.0);
    }

    let sum: i64 = rows.iter().map(|r| r.get::<i64, _>("confidence_score")).sum();
    let mean = sum as f64 / rows.len() as f64 / 100.0;

    sqlx::query("UPDATE discovered_venues SET chain_confidence = ? WHERE chain_id = ?")
        .bind(mean)
        .bind(chain_id.to_string())
        .execute(pool)
        .await?;

    Ok(mean)
}

/// Filtered, paginated listing.
///
/// Stable order: confidence_score descending, tie-broken by created_at
/// descending. Returns the page plus the total count ignoring pagination.
pub async fn list_venues(
    pool: &SqlitePool,
    filter: &ReviewFilter,
) -> Result<(Vec<DiscoveredVenue>, i64), StoreError> {
    let mut conditions: Vec<&str> = Vec::new();
    if filter.status.is_some() {
        conditions.push("status = ?");
    }
    if filter.country.is_some() {
        conditions.push("country = ?");
    }
    if filter.platform.is_some() {
        // delivery_platforms is a JSON array; serde emits "platform":"<name>"
        conditions.push("delivery_platforms LIKE ?");
    }
    if filter.chain_id.is_some() {
        conditions.push("chain_id = ?");
    }
    if filter.min_confidence.is_some() {
        conditions.push("confidence_score >= ?");
    }
    if filter.max_confidence.is_some() {
        conditions.push("confidence_score <= ?");
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM discovered_venues{}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(status) = filter.status {
        count_query = count_query.bind(status.as_str());
    }
    if let Some(country) = &filter.country {
        count_query = count_query.bind(country.to_uppercase());
    }
    if let Some(platform) = filter.platform {
        count_query = count_query.bind(format!("%\"platform\":\"{}\"%", platform.as_str()));
    }
    if let Some(chain_id) = filter.chain_id {
        count_query = count_query.bind(chain_id.to_string());
    }
    if let Some(min) = filter.min_confidence {
        count_query = count_query.bind(min);
    }
    if let Some(max) = filter.max_confidence {
        count_query = count_query.bind(max);
    }
    let total = count_query.fetch_one(pool).await?;

    let list_sql = format!(
        "SELECT * FROM discovered_venues{}
         ORDER BY confidence_score DESC, created_at DESC
         LIMIT ? OFFSET ?",
        where_clause
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(status) = filter.status {
        list_query = list_query.bind(status.as_str());
    }
    if let Some(country) = &filter.country {
        list_query = list_query.bind(country.to_uppercase());
    }
    if let Some(platform) = filter.platform {
        list_query = list_query.bind(format!("%\"platform\":\"{}\"%", platform.as_str()));
    }
    if let Some(chain_id) = filter.chain_id {
        list_query = list_query.bind(chain_id.to_string());
    }
    if let Some(min) = filter.min_confidence {
        list_query = list_query.bind(min);
    }
    if let Some(max) = filter.max_confidence {
        list_query = list_query.bind(max);
    }
    let rows = list_query
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(pool)
        .await?;

    let venues = rows
        .iter()
        .map(row_to_venue)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((venues, total))
}

/// Aggregate statistics over the full store, computed in one scan so all
/// breakdowns reflect the same snapshot the listing uses.
pub async fn stats(pool: &SqlitePool) -> Result<ReviewStats, StoreError> {
    let rows = sqlx::query(
        "SELECT status, country, confidence_score, delivery_platforms FROM discovered_venues",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = ReviewStats {
        total: rows.len() as i64,
        total_discovered: 0,
        total_verified: 0,
        total_rejected: 0,
        total_promoted: 0,
        total_stale: 0,
        by_country: BTreeMap::new(),
        by_platform: BTreeMap::new(),
        by_confidence: ConfidenceBucketCounts::default(),
    };

    for row in rows {
        let status: String = row.get("status");
        match status.as_str() {
            "discovered" => stats.total_discovered += 1,
            "verified" => stats.total_verified += 1,
            "rejected" => stats.total_rejected += 1,
            "promoted" => stats.total_promoted += 1,
            "stale" => stats.total_stale += 1,
            _ => {}
        }

        let country: String = row.get("country");
        *stats.by_country.entry(country).or_insert(0) += 1;

        let platforms: Vec<PlatformLink> =
            serde_json::from_str(row.get::<&str, _>("delivery_platforms"))?;
        for link in platforms {
            *stats
                .by_platform
                .entry(link.platform.as_str().to_string())
                .or_insert(0) += 1;
        }

        let score: i64 = row.get("confidence_score");
        match crate::models::ConfidenceBucket::from_score(score) {
            crate::models::ConfidenceBucket::Low => stats.by_confidence.low += 1,
            crate::models::ConfidenceBucket::Medium => stats.by_confidence.medium += 1,
            crate::models::ConfidenceBucket::High => stats.by_confidence.high += 1,
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;
    use crate::models::DeliveryPlatform;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        init_tables(&pool).await.expect("Failed to init tables");
        pool
    }

    fn sample_venue(name: &str, city: &str, country: &str) -> DiscoveredVenue {
        DiscoveredVenue {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: Address {
                street: None,
                city: city.to_string(),
                postal_code: None,
                country: country.to_string(),
            },
            coordinates: None,
            is_chain: false,
            chain_id: None,
            chain_name: None,
            chain_confidence: None,
            delivery_platforms: vec![PlatformLink {
                platform: DeliveryPlatform::Wolt,
                url: format!("https://wolt.example/{}", normalize_key(name)),
                rating: Some(4.2),
                review_count: Some(55),
            }],
            planted_products: vec!["planted.chicken".to_string()],
            dishes: vec![],
            confidence_score: 55,
            confidence_factors: vec![ConfidenceFactor {
                factor: "dishes_detected".to_string(),
                score: 5,
                reason: "test".to_string(),
            }],
            status: VenueStatus::Discovered,
            rejection_reason: None,
            production_venue_id: None,
            discovered_by_strategy_id: "platform-crawl".to_string(),
            discovered_by_query: "planted".to_string(),
            created_at: Utc::now(),
            verified_at: None,
            last_seen_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_load_round_trip() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let loaded = load_venue(&pool, venue.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Tibits");
        assert_eq!(loaded.status, VenueStatus::Discovered);
        assert_eq!(loaded.delivery_platforms.len(), 1);
        assert_eq!(loaded.confidence_score, 55);
        loaded.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn verify_is_idempotent() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let (first, applied) = verify_venue(&pool, venue.id, &VenueUpdate::default(), false)
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(first.status, VenueStatus::Verified);
        let verified_at = first.verified_at.unwrap();

        let (second, applied) = verify_venue(&pool, venue.id, &VenueUpdate::default(), false)
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(second.verified_at.unwrap(), verified_at);

        // Single audit entry despite two calls
        let entries = audit::list_for_document(&pool, &venue.id.to_string())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn verify_applies_updates_atomically() {
        let pool = memory_pool().await;
        let venue = sample_venue("Hiltl Sihlpost", "Zürich", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let updates = VenueUpdate {
            name: Some("Hiltl Sihlpost AG".to_string()),
            ..Default::default()
        };
        let (updated, applied) = verify_venue(&pool, venue.id, &updates, false).await.unwrap();
        assert!(applied);
        assert_eq!(updated.name, "Hiltl Sihlpost AG");
        assert_eq!(updated.status, VenueStatus::Verified);
        assert!(updated.verified_at.is_some());
        updated.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn verify_rejects_duplicate_platform_replacement() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let updates = VenueUpdate {
            delivery_platforms: Some(vec![
                PlatformLink {
                    platform: DeliveryPlatform::Wolt,
                    url: "https://wolt.example/tibits".to_string(),
                    rating: Some(4.4),
                    review_count: None,
                },
                PlatformLink {
                    platform: DeliveryPlatform::Wolt,
                    url: "https://wolt.example/tibits-basel".to_string(),
                    rating: None,
                    review_count: None,
                },
            ]),
            ..Default::default()
        };
        let err = verify_venue(&pool, venue.id, &updates, false).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // Record untouched and still invariant-clean
        let current = load_venue(&pool, venue.id).await.unwrap().unwrap();
        assert_eq!(current.status, VenueStatus::Discovered);
        current.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn verify_replaces_dishes_and_platforms_wholesale() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let updates = VenueUpdate {
            delivery_platforms: Some(vec![PlatformLink {
                platform: DeliveryPlatform::UberEats,
                url: "https://ubereats.example/tibits".to_string(),
                rating: Some(4.1),
                review_count: Some(12),
            }]),
            dishes: Some(vec![DishCandidate {
                name: "Planted Kebab".to_string(),
                price: Some("19.50 CHF".to_string()),
                product: "planted.kebab".to_string(),
                description: None,
                confidence: Some(90),
            }]),
            ..Default::default()
        };
        let (updated, applied) = verify_venue(&pool, venue.id, &updates, false).await.unwrap();
        assert!(applied);

        // Replaced wholesale: the original wolt link is gone
        assert_eq!(updated.delivery_platforms.len(), 1);
        assert_eq!(
            updated.delivery_platforms[0].platform,
            DeliveryPlatform::UberEats
        );
        assert_eq!(updated.dishes.len(), 1);
        assert_eq!(updated.dishes[0].product, "planted.kebab");

        let reloaded = load_venue(&pool, venue.id).await.unwrap().unwrap();
        assert_eq!(reloaded.delivery_platforms, updated.delivery_platforms);
        assert_eq!(reloaded.dishes, updated.dishes);
        reloaded.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn update_and_verify_requires_a_change() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let err = verify_venue(&pool, venue.id, &VenueUpdate::default(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // Record unchanged
        let current = load_venue(&pool, venue.id).await.unwrap().unwrap();
        assert_eq!(current.status, VenueStatus::Discovered);
    }

    #[tokio::test]
    async fn reject_requires_nonempty_reason() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let err = reject_venue(&pool, venue.id, "  ").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let current = load_venue(&pool, venue.id).await.unwrap().unwrap();
        assert_eq!(current.status, VenueStatus::Discovered);

        let rejected = reject_venue(&pool, venue.id, "Venue permanently closed")
            .await
            .unwrap();
        assert_eq!(rejected.status, VenueStatus::Rejected);
        assert_eq!(
            rejected.rejection_reason.as_deref(),
            Some("Venue permanently closed")
        );
        rejected.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn verify_after_reject_conflicts() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        reject_venue(&pool, venue.id, "duplicate").await.unwrap();
        let err = verify_venue(&pool, venue.id, &VenueUpdate::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_sweep_only_touches_old_discovered() {
        let pool = memory_pool().await;

        let mut old = sample_venue("Old Venue", "Bern", "CH");
        old.last_seen_at = Utc::now() - chrono::Duration::days(60);
        insert_venue(&pool, &old).await.unwrap();

        let fresh = sample_venue("Fresh Venue", "Bern", "CH");
        insert_venue(&pool, &fresh).await.unwrap();

        let mut verified = sample_venue("Verified Venue", "Bern", "CH");
        verified.last_seen_at = Utc::now() - chrono::Duration::days(60);
        insert_venue(&pool, &verified).await.unwrap();
        verify_venue(&pool, verified.id, &VenueUpdate::default(), false)
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(30);
        let marked = mark_stale_before(&pool, cutoff).await.unwrap();
        assert_eq!(marked, 1);

        assert_eq!(
            load_venue(&pool, old.id).await.unwrap().unwrap().status,
            VenueStatus::Stale
        );
        assert_eq!(
            load_venue(&pool, fresh.id).await.unwrap().unwrap().status,
            VenueStatus::Discovered
        );
    }

    #[tokio::test]
    async fn listing_orders_by_confidence_then_recency() {
        let pool = memory_pool().await;

        let mut low = sample_venue("Low", "Basel", "CH");
        low.confidence_score = 30;
        low.confidence_factors = vec![ConfidenceFactor {
            factor: "near_duplicate".to_string(),
            score: -20,
            reason: "test".to_string(),
        }];
        insert_venue(&pool, &low).await.unwrap();

        let mut high = sample_venue("High", "Basel", "CH");
        high.confidence_score = 90;
        high.confidence_factors = vec![ConfidenceFactor {
            factor: "chain_name_match".to_string(),
            score: 40,
            reason: "test".to_string(),
        }];
        insert_venue(&pool, &high).await.unwrap();

        let (venues, total) = list_venues(&pool, &ReviewFilter::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(venues[0].name, "High");
        assert_eq!(venues[1].name, "Low");
    }

    #[tokio::test]
    async fn listing_filters_by_country_and_confidence() {
        let pool = memory_pool().await;
        insert_venue(&pool, &sample_venue("Tibits", "Basel", "CH"))
            .await
            .unwrap();
        insert_venue(&pool, &sample_venue("Tibits", "Berlin", "DE"))
            .await
            .unwrap();

        let filter = ReviewFilter {
            country: Some("de".to_string()),
            ..Default::default()
        };
        let (venues, total) = list_venues(&pool, &filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(venues[0].address.country, "DE");

        let filter = ReviewFilter {
            min_confidence: Some(60),
            ..Default::default()
        };
        let (_, total) = list_venues(&pool, &filter).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn stats_buckets_and_statuses() {
        let pool = memory_pool().await;

        let mut low = sample_venue("Low", "Basel", "CH");
        low.confidence_score = 39;
        low.confidence_factors.clear();
        low.confidence_factors.push(ConfidenceFactor {
            factor: "near_duplicate".to_string(),
            score: -11,
            reason: "test".to_string(),
        });
        insert_venue(&pool, &low).await.unwrap();

        let mut medium = sample_venue("Medium", "Basel", "CH");
        medium.confidence_score = 40;
        insert_venue(&pool, &medium).await.unwrap();

        let mut high = sample_venue("High", "Berlin", "DE");
        high.confidence_score = 70;
        insert_venue(&pool, &high).await.unwrap();

        let stats = stats(&pool).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_discovered, 3);
        assert_eq!(stats.by_confidence.low, 1);
        assert_eq!(stats.by_confidence.medium, 1);
        assert_eq!(stats.by_confidence.high, 1);
        assert_eq!(stats.by_country.get("CH"), Some(&2));
        assert_eq!(stats.by_country.get("DE"), Some(&1));
        assert_eq!(stats.by_platform.get("wolt"), Some(&3));
    }

    #[tokio::test]
    async fn merge_adds_platform_without_duplicates() {
        let pool = memory_pool().await;
        let venue = sample_venue("Tibits", "Basel", "CH");
        insert_venue(&pool, &venue).await.unwrap();

        let candidate = DiscoveredVenueCandidate {
            name: "Tibits".to_string(),
            address: venue.address.clone(),
            coordinates: Some(Coordinates { lat: 47.55, lng: 7.59 }),
            delivery_platforms: vec![
                PlatformLink {
                    platform: DeliveryPlatform::UberEats,
                    url: "https://ubereats.example/tibits".to_string(),
                    rating: Some(4.5),
                    review_count: None,
                },
                PlatformLink {
                    platform: DeliveryPlatform::Wolt,
                    url: "https://wolt.example/tibits-again".to_string(),
                    rating: None,
                    review_count: None,
                },
            ],
            planted_products: vec!["planted.kebab".to_string()],
            dishes: vec![DishCandidate {
                name: "Planted Kebab".to_string(),
                price: Some("19.50 CHF".to_string()),
                product: "planted.kebab".to_string(),
                description: None,
                confidence: Some(90),
            }],
        };

        let merged = merge_candidate(&pool, venue.id, &candidate).await.unwrap();
        // Wolt link already present, only uber-eats added
        assert_eq!(merged.delivery_platforms.len(), 2);
        assert!(merged.coordinates.is_some());
        assert_eq!(merged.dishes.len(), 1);
        assert_eq!(
            merged.planted_products,
            vec!["planted.chicken".to_string(), "planted.kebab".to_string()]
        );
        merged.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn chain_confidence_is_mean_of_siblings() {
        let pool = memory_pool().await;
        let chain_id = Uuid::new_v4();

        for (name, score) in [("Tibits Basel", 60), ("Tibits Bern", 80)] {
            let mut venue = sample_venue(name, "Basel", "CH");
            venue.is_chain = true;
            venue.chain_id = Some(chain_id);
            venue.chain_name = Some("Tibits".to_string());
            venue.confidence_score = score;
            venue.confidence_factors = vec![ConfidenceFactor {
                factor: "test".to_string(),
                score: score - 50,
                reason: "test".to_string(),
            }];
            insert_venue(&pool, &venue).await.unwrap();
        }

        let mean = recompute_chain_confidence(&pool, chain_id).await.unwrap();
        assert!((mean - 0.70).abs() < 1e-9);

        let groups = chains_in_country(&pool, "CH").await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sibling_scores.len(), 2);
    }
}
