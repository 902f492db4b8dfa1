//! Discovered venue review state machine
//!
//! A discovered venue progresses one-way out of its initial state:
//! discovered → verified → promoted, discovered → rejected, discovered → stale.
//! There is no un-reject or un-verify; re-discovery under a fresh scrape
//! updates `last_seen_at` or inserts a new record, never rolls back status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review status of a discovered venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueStatus {
    /// Freshly scraped, awaiting human review
    Discovered,
    /// Approved by a reviewer
    Verified,
    /// Declined by a reviewer (rejection_reason required)
    Rejected,
    /// Materialized into the production store
    Promoted,
    /// Not reconfirmed by any scraper within the staleness window
    Stale,
}

impl VenueStatus {
    /// Stable string form used in the database and query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueStatus::Discovered => "discovered",
            VenueStatus::Verified => "verified",
            VenueStatus::Rejected => "rejected",
            VenueStatus::Promoted => "promoted",
            VenueStatus::Stale => "stale",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(VenueStatus::Discovered),
            "verified" => Some(VenueStatus::Verified),
            "rejected" => Some(VenueStatus::Rejected),
            "promoted" => Some(VenueStatus::Promoted),
            "stale" => Some(VenueStatus::Stale),
            _ => None,
        }
    }
}

/// Delivery platform a venue is listed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryPlatform {
    UberEats,
    Lieferando,
    Wolt,
    JustEat,
    Smood,
    Deliveroo,
}

impl DeliveryPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryPlatform::UberEats => "uber-eats",
            DeliveryPlatform::Lieferando => "lieferando",
            DeliveryPlatform::Wolt => "wolt",
            DeliveryPlatform::JustEat => "just-eat",
            DeliveryPlatform::Smood => "smood",
            DeliveryPlatform::Deliveroo => "deliveroo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uber-eats" => Some(DeliveryPlatform::UberEats),
            "lieferando" => Some(DeliveryPlatform::Lieferando),
            "wolt" => Some(DeliveryPlatform::Wolt),
            "just-eat" => Some(DeliveryPlatform::JustEat),
            "smood" => Some(DeliveryPlatform::Smood),
            "deliveroo" => Some(DeliveryPlatform::Deliveroo),
        _ => None,
        }
    }
}

/// Postal address, country as ISO 3166-1 alpha-2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A venue listing on one delivery platform
///
/// `delivery_platforms` is unique by `platform`; the store rejects or
/// merges duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformLink {
    pub platform: DeliveryPlatform,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<i64>,
}

/// An embedded dish candidate detected at a venue
///
/// Price is free text, platform-native currency formatting preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishCandidate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Product SKU, e.g. `planted.chicken`
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<i64>,
}

/// One named contribution to the overall confidence score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub factor: String,
    /// Signed delta applied on top of the base score
    pub score: i64,
    pub reason: String,
}

/// A confidence-scored venue awaiting or having completed human review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredVenue {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    pub is_chain: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    /// 0.0–1.0, mean of all sibling confidences contributing to the chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_confidence: Option<f64>,

    pub delivery_platforms: Vec<PlatformLink>,
    pub planted_products: Vec<String>,
    pub dishes: Vec<DishCandidate>,

    pub confidence_score: i64,
    pub confidence_factors: Vec<ConfidenceFactor>,

    pub status: VenueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_venue_id: Option<Uuid>,

    /// Which discovery heuristic produced this record
    pub discovered_by_strategy_id: String,
    /// The concrete search query that surfaced it
    pub discovered_by_query: String,

    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// Last time any scraper re-confirmed this venue; staleness sweep input
    pub last_seen_at: DateTime<Utc>,
}

impl DiscoveredVenue {
    /// Check the record-level invariants the state machine maintains.
    ///
    /// Returns the first violated invariant as an error string. Used by
    /// tests after every transition.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            VenueStatus::Rejected => {
                if self
                    .rejection_reason
                    .as_deref()
                    .map(|r| r.trim().is_empty())
                    .unwrap_or(true)
                {
                    return Err("rejected venue without rejection_reason".to_string());
                }
            }
            VenueStatus::Verified | VenueStatus::Promoted => {
                if self.rejection_reason.is_some() {
                    return Err(format!(
                        "{} venue carries a rejection_reason",
                        self.status.as_str()
                    ));
                }
            }
            _ => {}
        }

        if self.status == VenueStatus::Promoted && self.production_venue_id.is_none() {
            return Err("promoted venue without production_venue_id".to_string());
        }
        if self.status != VenueStatus::Promoted && self.production_venue_id.is_some() {
            return Err("production_venue_id set on non-promoted venue".to_string());
        }

        if self.chain_id.is_some() && !self.is_chain {
            return Err("chain_id present but is_chain = false".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for link in &self.delivery_platforms {
            if !seen.insert(link.platform) {
                return Err(format!(
                    "duplicate delivery platform entry: {}",
                    link.platform.as_str()
                ));
            }
        }

        let factor_sum: i64 = self.confidence_factors.iter().map(|f| f.score).sum();
        let expected = (crate::pipeline::scorer::BASE_SCORE + factor_sum).clamp(0, 100);
        if self.confidence_score != expected {
            return Err(format!(
                "confidence_score {} does not match factors (expected {})",
                self.confidence_score, expected
            ));
        }

        Ok(())
    }
}

/// Partial field update applied by Verify / EditAndVerify.
///
/// Merge semantics: present fields overwrite, omitted fields retain the
/// prior value. `dishes` and `delivery_platforms` are replaced wholesale
/// when included, never deep-merged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VenueUpdate {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub delivery_platforms: Option<Vec<PlatformLink>>,
    pub planted_products: Option<Vec<String>>,
    pub dishes: Option<Vec<DishCandidate>>,
}

impl VenueUpdate {
    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.street.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
            && self.coordinates.is_none()
            && self.delivery_platforms.is_none()
            && self.planted_products.is_none()
            && self.dishes.is_none()
    }

    /// Validate a caller-supplied update before it is applied.
    ///
    /// A wholesale `delivery_platforms` replacement must itself satisfy the
    /// record invariant of one entry per platform; applying it unchecked
    /// would persist a record `check_invariants` rejects.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(platforms) = &self.delivery_platforms {
            let mut seen = std::collections::HashSet::new();
            for link in platforms {
                if !seen.insert(link.platform) {
                    return Err(format!(
                        "duplicate delivery platform entry: {}",
                        link.platform.as_str()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Apply the update to a venue. Returns true if any field actually changed.
    pub fn apply(&self, venue: &mut DiscoveredVenue) -> bool {
        let mut changed = false;

        if let Some(name) = &self.name {
            if venue.name != *name {
                venue.name = name.clone();
                changed = true;
            }
        }
        if let Some(street) = &self.street {
            if venue.address.street.as_deref() != Some(street.as_str()) {
                venue.address.street = Some(street.clone());
                changed = true;
            }
        }
        if let Some(city) = &self.city {
            if venue.address.city != *city {
                venue.address.city = city.clone();
                changed = true;
            }
        }
        if let Some(postal_code) = &self.postal_code {
            if venue.address.postal_code.as_deref() != Some(postal_code.as_str()) {
                venue.address.postal_code = Some(postal_code.clone());
                changed = true;
            }
        }
        if let Some(country) = &self.country {
            let country = country.trim().to_uppercase();
            if venue.address.country != country {
                venue.address.country = country;
                changed = true;
            }
        }
        if let Some(coordinates) = self.coordinates {
            if venue.coordinates != Some(coordinates) {
                venue.coordinates = Some(coordinates);
                changed = true;
            }
        }
        if let Some(platforms) = &self.delivery_platforms {
            if venue.delivery_platforms != *platforms {
                venue.delivery_platforms = platforms.clone();
                changed = true;
            }
        }
        if let Some(products) = &self.planted_products {
            if venue.planted_products != *products {
                venue.planted_products = products.clone();
                changed = true;
            }
        }
        if let Some(dishes) = &self.dishes {
            if venue.dishes != *dishes {
                venue.dishes = dishes.clone();
                changed = true;
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_venue() -> DiscoveredVenue {
        DiscoveredVenue {
            id: Uuid::new_v4(),
            name: "Hiltl Sihlpost".to_string(),
            address: Address {
                street: None,
                city: "Zürich".to_string(),
                postal_code: None,
                country: "CH".to_string(),
            },
            coordinates: None,
            is_chain: false,
            chain_id: None,
            chain_name: None,
            chain_confidence: None,
            delivery_platforms: vec![PlatformLink {
                platform: DeliveryPlatform::UberEats,
                url: "https://ubereats.example/hiltl".to_string(),
                rating: Some(4.6),
                review_count: Some(210),
            }],
            planted_products: vec!["planted.chicken".to_string()],
            dishes: vec![],
            confidence_score: 50,
            confidence_factors: vec![],
            status: VenueStatus::Discovered,
            rejection_reason: None,
            production_venue_id: None,
            discovered_by_strategy_id: "platform-crawl".to_string(),
            discovered_by_query: "planted zürich".to_string(),
            created_at: Utc::now(),
            verified_at: None,
            last_seen_at: Utc::now(),
        }
    }

    #[test]
    fn invariants_hold_for_fresh_venue() {
        assert!(sample_venue().check_invariants().is_ok());
    }

    #[test]
    fn rejected_requires_reason() {
        let mut venue = sample_venue();
        venue.status = VenueStatus::Rejected;
        assert!(venue.check_invariants().is_err());

        venue.rejection_reason = Some("Venue permanently closed".to_string());
        assert!(venue.check_invariants().is_ok());
    }

    #[test]
    fn promoted_requires_production_link() {
        let mut venue = sample_venue();
        venue.status = VenueStatus::Promoted;
        assert!(venue.check_invariants().is_err());

        venue.production_venue_id = Some(Uuid::new_v4());
        assert!(venue.check_invariants().is_ok());
    }

    #[test]
    fn duplicate_platforms_violate_invariants() {
        let mut venue = sample_venue();
        venue
            .delivery_platforms
            .push(venue.delivery_platforms[0].clone());
        assert!(venue.check_invariants().is_err());
    }

    #[test]
    fn chain_id_requires_is_chain() {
        let mut venue = sample_venue();
        venue.chain_id = Some(Uuid::new_v4());
        assert!(venue.check_invariants().is_err());
        venue.is_chain = true;
        assert!(venue.check_invariants().is_ok());
    }

    #[test]
    fn update_apply_reports_changes() {
        let mut venue = sample_venue();
        let update = VenueUpdate {
            name: Some("Hiltl Sihlpost AG".to_string()),
            ..Default::default()
        };
        assert!(update.apply(&mut venue));
        assert_eq!(venue.name, "Hiltl Sihlpost AG");

        // Same update again: nothing changes
        assert!(!update.apply(&mut venue));
    }

    #[test]
    fn empty_update_is_empty() {
        assert!(VenueUpdate::default().is_empty());
    }

    #[test]
    fn update_with_duplicate_platforms_fails_validation() {
        let link = PlatformLink {
            platform: DeliveryPlatform::Wolt,
            url: "https://wolt.example/hiltl".to_string(),
            rating: None,
            review_count: None,
        };
        let update = VenueUpdate {
            delivery_platforms: Some(vec![link.clone(), link]),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = VenueUpdate {
            delivery_platforms: Some(vec![PlatformLink {
                platform: DeliveryPlatform::Wolt,
                url: "https://wolt.example/hiltl".to_string(),
                rating: None,
                review_count: None,
            }]),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }
}
