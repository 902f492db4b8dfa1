//! Production venue store
//!
//! The curated, published venue records the promotion writer materializes
//! verified discoveries into. Lookup is by the natural key
//! (normalized name, normalized city, country), which is what makes
//! promotion retry-safe.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{normalize_key, StoreError};
use crate::models::{Address, Coordinates, PlatformLink, Venue};

fn row_to_venue(row: &sqlx::sqlite::SqliteRow) -> Result<Venue, StoreError> {
    let id: String = row.get("id");
    let discovered_venue_id: Option<String> = row.get("discovered_venue_id");
    let lat: Option<f64> = row.get("lat");
    let lng: Option<f64> = row.get("lng");
    let delivery_platforms: Vec<PlatformLink> =
        serde_json::from_str(row.get::<&str, _>("delivery_platforms"))?;

    Ok(Venue {
        id: Uuid::parse_str(&id)
            .map_err(|e| StoreError::Validation(format!("invalid uuid {}: {}", id, e)))?,
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
        delivery_platforms,
        status: row.get("status"),
        discovered_venue_id: discovered_venue_id
            .map(|s| {
                Uuid::parse_str(&s)
                    .map_err(|e| StoreError::Validation(format!("invalid uuid {}: {}", s, e)))
            })
            .transpose()?,
        created_at: row.get("created_at"),
        last_verified: row.get("last_verified"),
    })
}

/// Save a production venue.
pub async fn create_venue(pool: &SqlitePool, venue: &Venue) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO venues (
            id, name, name_normalized, street, city, city_normalized, postal_code, country,
            lat, lng, delivery_platforms, status, discovered_venue_id, created_at, last_verified
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
    .bind(serde_json::to_string(&venue.delivery_platforms)?)
    .bind(&venue.status)
    .bind(venue.discovered_venue_id.map(|id| id.to_string()))
    .bind(venue.created_at)
    .bind(venue.last_verified)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a production venue by id.
pub async fn load_venue(pool: &SqlitePool, id: Uuid) -> Result<Option<Venue>, StoreError> {
    let row = sqlx::query("SELECT * FROM venues WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_venue).transpose()
}

/// Natural-key lookup: case-insensitive name and city within a country.
pub async fn find_by_name_city(
    pool: &SqlitePool,
    name: &str,
    city: &str,
    country: &str,
) -> Result<Option<Venue>, StoreError> {
    let row = sqlx::query(
        "SELECT * FROM venues
         WHERE name_normalized = ? AND city_normalized = ? AND country = ?
         ORDER BY created_at ASC LIMIT 1",
    )
    .bind(normalize_key(name))
    .bind(normalize_key(city))
    .bind(country)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_venue).transpose()
}

/// Refresh last_verified on a re-promotion that found the venue unchanged.
pub async fn touch_last_verified(pool: &SqlitePool, id: Uuid) -> Result<(), StoreError> {
    sqlx::query("UPDATE venues SET last_verified = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;

    fn sample_venue() -> Venue {
        Venue {
            id: Uuid::new_v4(),
            name: "Hiltl Sihlpost".to_string(),
            address: Address {
                street: Some("Sihlpost 2".to_string()),
                city: "Zürich".to_string(),
                postal_code: Some("8004".to_string()),
                country: "CH".to_string(),
            },
            coordinates: Some(Coordinates {
                lat: 47.378,
                lng: 8.535,
            }),
            delivery_platforms: vec![],
            status: "active".to_string(),
            discovered_venue_id: None,
            created_at: Utc::now(),
            last_verified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn natural_key_lookup_is_case_insensitive() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_tables(&pool).await.unwrap();

        let venue = sample_venue();
        create_venue(&pool, &venue).await.unwrap();

        let found = find_by_name_city(&pool, "HILTL SIHLPOST", "zürich", "CH")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, venue.id);

        let missing = find_by_name_city(&pool, "Hiltl Sihlpost", "Zürich", "DE")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
