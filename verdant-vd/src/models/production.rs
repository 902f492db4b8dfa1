//! Production venue and dish records
//!
//! Created by the promotion writer; the discovered-venue pipeline never
//! writes back into them except through promotion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::discovered_venue::{Address, Coordinates, PlatformLink};

/// A curated, published venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub delivery_platforms: Vec<PlatformLink>,
    pub status: String,
    /// Back-reference to the discovered venue this was promoted from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_venue_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_verified: DateTime<Utc>,
}

/// A published dish under a production venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Product SKU, e.g. `planted.chicken`
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
