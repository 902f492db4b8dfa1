//! Production dish store
//!
//! Dishes are scoped to a production venue; identity within a venue is the
//! case-insensitive dish name, enforced by a UNIQUE constraint so retried
//! promotions can't create duplicates.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{normalize_key, StoreError};
use crate::models::Dish;

fn row_to_dish(row: &sqlx::sqlite::SqliteRow) -> Result<Dish, StoreError> {
    let id: String = row.get("id");
    let venue_id: String = row.get("venue_id");

    Ok(Dish {
        id: Uuid::parse_str(&id)
            .map_err(|e| StoreError::Validation(format!("invalid uuid {}: {}", id, e)))?,
        venue_id: Uuid::parse_str(&venue_id)
            .map_err(|e| StoreError::Validation(format!("invalid uuid {}: {}", venue_id, e)))?,
        name: row.get("name"),
        price: row.get("price"),
        product: row.get("product"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
    })
}

/// Save a production dish.
pub async fn create_dish(pool: &SqlitePool, dish: &Dish) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO dishes (
            id, venue_id, name, name_normalized, price, product, description, image_url, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(dish.id.to_string())
    .bind(dish.venue_id.to_string())
    .bind(&dish.name)
    .bind(normalize_key(&dish.name))
    .bind(&dish.price)
    .bind(&dish.product)
    .bind(&dish.description)
    .bind(&dish.image_url)
    .bind(dish.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// All dishes under a venue.
pub async fn get_by_venue(pool: &SqlitePool, venue_id: Uuid) -> Result<Vec<Dish>, StoreError> {
    let rows = sqlx::query("SELECT * FROM dishes WHERE venue_id = ? ORDER BY created_at ASC")
        .bind(venue_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_dish).collect()
}

/// Update the mutable dish fields (price, description, image).
pub async fn update_mutable(
    pool: &SqlitePool,
    id: Uuid,
    price: Option<&str>,
    description: Option<&str>,
    image_url: Option<&str>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE dishes SET price = ?, description = ?, image_url = ? WHERE id = ?")
        .bind(price)
        .bind(description)
        .bind(image_url)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
