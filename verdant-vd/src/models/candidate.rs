//! Scraper boundary types
//!
//! Scrapers emit loosely-shaped, platform-native records. They are modeled
//! as a tagged union at the boundary and normalized immediately into the
//! one strict [`DiscoveredVenueCandidate`] shape; per-platform shapes never
//! leak past the normalizer.

use serde::{Deserialize, Serialize};

use super::discovered_venue::{Address, Coordinates, DishCandidate, PlatformLink};

/// Raw scrape result, one variant per source platform.
///
/// Field names mirror what each platform's scraper sees on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "kebab-case")]
pub enum ScrapeRecord {
    Wolt {
        name: Option<String>,
        city: Option<String>,
        post_code: Option<String>,
        country: Option<String>,
        address: Option<String>,
        location: Option<WoltLocation>,
        url: Option<String>,
        rating: Option<WoltRating>,
        #[serde(default)]
        items: Vec<WoltMenuItem>,
    },
    Lieferando {
        restaurant_name: Option<String>,
        street: Option<String>,
        city: Option<String>,
        zipcode: Option<String>,
        country_code: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        url: Option<String>,
        rating_stars: Option<f64>,
        rating_count: Option<i64>,
        #[serde(default)]
        menu: Vec<LieferandoDish>,
    },
    #[serde(rename = "uber-eats")]
    UberEats {
        title: Option<String>,
        location: Option<UberLocation>,
        url: Option<String>,
        rating: Option<f64>,
        review_count: Option<i64>,
        #[serde(default)]
        menu_items: Vec<UberMenuItem>,
    },
    /// Pre-normalized record from secondary scrapers (Just Eat, Smood,
    /// Deliveroo) that already emit the canonical shape.
    Generic {
        name: Option<String>,
        address: Option<Address>,
        coordinates: Option<Coordinates>,
        #[serde(default)]
        delivery_platforms: Vec<PlatformLink>,
        #[serde(default)]
        dishes: Vec<GenericDish>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WoltLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WoltRating {
    pub score: f64,
    pub volume: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WoltMenuItem {
    pub name: String,
    pub baseprice: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LieferandoDish {
    pub title: String,
    pub price: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UberLocation {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UberMenuItem {
    pub name: String,
    pub price_formatted: Option<String>,
    pub item_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericDish {
    pub name: String,
    pub price: Option<String>,
    pub description: Option<String>,
}

/// The canonical candidate shape produced by the normalizer.
///
/// Not yet stored; the scorer and matcher operate on this before a
/// `DiscoveredVenue` record is created or merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredVenueCandidate {
    pub name: String,
    pub address: Address,
    pub coordinates: Option<Coordinates>,
    pub delivery_platforms: Vec<PlatformLink>,
    pub planted_products: Vec<String>,
    pub dishes: Vec<DishCandidate>,
}
