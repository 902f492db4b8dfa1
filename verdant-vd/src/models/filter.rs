//! Review queue filters and confidence buckets

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::discovered_venue::{DeliveryPlatform, VenueStatus};

/// Default page size for review listings
pub const DEFAULT_LIMIT: i64 = 50;
/// Maximum page size a caller may request
pub const MAX_LIMIT: i64 = 200;

/// Query parameters for review listings. Constructed per request, never
/// persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    pub status: Option<VenueStatus>,
    pub country: Option<String>,
    pub platform: Option<DeliveryPlatform>,
    pub chain_id: Option<Uuid>,
    pub min_confidence: Option<i64>,
    pub max_confidence: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReviewFilter {
    /// Effective page size: default 50, clamped to 1..=200
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Effective offset: never negative
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Confidence bucket for reporting.
///
/// Half-open intervals; 40 and 70 belong to the higher bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    Low,
    Medium,
    High,
}

impl ConfidenceBucket {
    pub fn from_score(score: i64) -> Self {
        if score >= 70 {
            ConfidenceBucket::High
        } else if score >= 40 {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}
