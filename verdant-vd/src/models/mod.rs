//! Data models for verdant-vd (Venue Discovery service)
//!
//! - Discovered venue review state machine
//! - Per-platform scrape record boundary types
//! - Review filters and confidence types

pub mod candidate;
pub mod discovered_venue;
pub mod filter;
pub mod production;

pub use candidate::{DiscoveredVenueCandidate, ScrapeRecord};
pub use discovered_venue::{
    Address, ConfidenceFactor, Coordinates, DeliveryPlatform, DiscoveredVenue, DishCandidate,
    PlatformLink, VenueStatus, VenueUpdate,
};
pub use filter::{ConfidenceBucket, ReviewFilter};
pub use production::{Dish, Venue};
