//! Confidence scorer
//!
//! Computes a 0-100 confidence score for a normalized candidate, starting
//! from a base of 50 and applying an ordered list of signed factors. The
//! function is pure: re-scoring identical input yields an identical score
//! and factor list.

use crate::models::{ConfidenceFactor, DiscoveredVenueCandidate};

/// Starting score before any factor is applied
pub const BASE_SCORE: i64 = 50;

/// Contextual signals the scorer cannot derive from the candidate alone
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreSignals {
    /// An exact or fuzzy duplicate already exists in the production store
    pub near_duplicate_exists: bool,
    /// The matcher found an exact chain name match in the same country
    pub chain_name_match: bool,
}

/// Name tokens that carry no identity on their own
const GENERIC_NAME_TERMS: &[&str] = &[
    "restaurant",
    "cafe",
    "café",
    "bistro",
    "imbiss",
    "kebab",
    "pizzeria",
    "takeaway",
    "grill",
    "bar",
    "diner",
    "snack",
    "food",
    "vegan",
    "veggie",
    "kitchen",
];

/// Score a candidate. Returns the clamped overall score and the ordered
/// factor breakdown that produced it.
pub fn score_candidate(
    candidate: &DiscoveredVenueCandidate,
    signals: ScoreSignals,
) -> (i64, Vec<ConfidenceFactor>) {
    let mut factors = Vec::new();

    let best_rating = candidate
        .delivery_platforms
        .iter()
        .filter_map(|p| p.rating)
        .fold(None::<f64>, |best, r| {
            Some(best.map_or(r, |b| b.max(r)))
        });

    if let Some(rating) = best_rating {
        if rating >= 4.0 {
            factors.push(ConfidenceFactor {
                factor: "platform_rating".to_string(),
                score: 15,
                reason: format!("platform rating {:.1} >= 4.0", rating),
            });
        }
    }

    let total_reviews: i64 = candidate
        .delivery_platforms
        .iter()
        .filter_map(|p| p.review_count)
        .sum();
    if total_reviews >= 100 {
        factors.push(ConfidenceFactor {
            factor: "review_volume".to_string(),
            score: 5,
            reason: format!("{} reviews across platforms", total_reviews),
        });
    }

    if candidate.delivery_platforms.len() >= 2 {
        factors.push(ConfidenceFactor {
            factor: "multi_platform".to_string(),
            score: 10,
            reason: format!(
                "listed on {} delivery platforms",
                candidate.delivery_platforms.len()
            ),
        });
    }

    if !candidate.planted_products.is_empty() {
        factors.push(ConfidenceFactor {
            factor: "products_detected".to_string(),
            score: 10,
            reason: format!("{} target products detected", candidate.planted_products.len()),
        });
    }
    if candidate.planted_products.len() >= 3 {
        factors.push(ConfidenceFactor {
            factor: "product_breadth".to_string(),
            score: 10,
            reason: ">=3 distinct target products".to_string(),
        });
    }

    if !candidate.dishes.is_empty() {
        factors.push(ConfidenceFactor {
            factor: "dishes_detected".to_string(),
            score: 5,
            reason: format!("{} matching dishes on the menu", candidate.dishes.len()),
        });
    }
    if candidate.dishes.len() >= 5 {
        factors.push(ConfidenceFactor {
            factor: "menu_depth".to_string(),
            score: 5,
            reason: ">=5 matching dishes".to_string(),
        });
    }

    if signals.chain_name_match {
        factors.push(ConfidenceFactor {
            factor: "chain_name_match".to_string(),
            score: 10,
            reason: "exact chain name match in same country".to_string(),
        });
    }

    if candidate.address.street.is_some() && candidate.address.postal_code.is_some() {
        factors.push(ConfidenceFactor {
            factor: "complete_address".to_string(),
            score: 5,
            reason: "street and postal code present".to_string(),
        });
    }

    if candidate.coordinates.is_none() {
        factors.push(ConfidenceFactor {
            factor: "missing_coordinates".to_string(),
            score: -10,
            reason: "no coordinates".to_string(),
        });
    }

    if candidate.delivery_platforms.len() == 1
        && candidate.delivery_platforms[0].rating.is_none()
    {
        factors.push(ConfidenceFactor {
            factor: "single_unrated_source".to_string(),
            score: -10,
            reason: "single platform source without a rating".to_string(),
        });
    }

    if is_generic_name(&candidate.name) {
        factors.push(ConfidenceFactor {
            factor: "generic_name".to_string(),
            score: -10,
            reason: "name contains only generic terms".to_string(),
        });
    }

    if signals.near_duplicate_exists {
        factors.push(ConfidenceFactor {
            factor: "near_duplicate".to_string(),
            score: -15,
            reason: "a similar venue already exists".to_string(),
        });
    }

    let score = (BASE_SCORE + factors.iter().map(|f| f.score).sum::<i64>()).clamp(0, 100);
    (score, factors)
}

/// True when every name token is a generic term
fn is_generic_name(name: &str) -> bool {
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    !tokens.is_empty()
        && tokens
            .iter()
            .all(|t| GENERIC_NAME_TERMS.contains(&t.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, DeliveryPlatform, DishCandidate, PlatformLink};

    fn rated_candidate() -> DiscoveredVenueCandidate {
        DiscoveredVenueCandidate {
            name: "Hiltl Sihlpost".to_string(),
            address: Address {
                street: None,
                city: "Zürich".to_string(),
                postal_code: None,
                country: "CH".to_string(),
            },
            coordinates: None,
            delivery_platforms: vec![PlatformLink {
                platform: DeliveryPlatform::UberEats,
                url: "https://ubereats.example/hiltl".to_string(),
                rating: Some(4.6),
                review_count: None,
            }],
            planted_products: vec!["planted.chicken".to_string()],
            dishes: vec![DishCandidate {
                name: "Planted Chicken Bowl".to_string(),
                price: None,
                product: "planted.chicken".to_string(),
                description: None,
                confidence: Some(90),
            }],
        }
    }

    #[test]
    fn rated_platform_with_specific_product_scores_high() {
        let (score, factors) = score_candidate(&rated_candidate(), ScoreSignals::default());
        // 50 + 15 (rating) + 10 (products) + 5 (dishes) - 10 (no coordinates)
        assert!(score >= 70, "expected high bucket, got {}", score);
        assert!(factors.iter().any(|f| f.factor == "platform_rating"));
    }

    #[test]
    fn scoring_is_deterministic() {
        let candidate = rated_candidate();
        let first = score_candidate(&candidate, ScoreSignals::default());
        let second = score_candidate(&candidate, ScoreSignals::default());
        assert_eq!(first, second);
    }

    #[test]
    fn score_equals_base_plus_factor_sum() {
        let (score, factors) = score_candidate(&rated_candidate(), ScoreSignals::default());
        let sum: i64 = factors.iter().map(|f| f.score).sum();
        assert_eq!(score, (BASE_SCORE + sum).clamp(0, 100));
    }

    #[test]
    fn near_duplicate_penalizes() {
        let candidate = rated_candidate();
        let (base, _) = score_candidate(&candidate, ScoreSignals::default());
        let (penalized, factors) = score_candidate(
            &candidate,
            ScoreSignals {
                near_duplicate_exists: true,
                ..Default::default()
            },
        );
        assert_eq!(penalized, base - 15);
        assert!(factors.iter().any(|f| f.factor == "near_duplicate"));
    }

    #[test]
    fn generic_only_name_is_penalized() {
        let mut candidate = rated_candidate();
        candidate.name = "Vegan Kebab Imbiss".to_string();
        let (_, factors) = score_candidate(&candidate, ScoreSignals::default());
        assert!(factors.iter().any(|f| f.factor == "generic_name"));

        candidate.name = "Hiltl Vegan Kebab".to_string();
        let (_, factors) = score_candidate(&candidate, ScoreSignals::default());
        assert!(!factors.iter().any(|f| f.factor == "generic_name"));
    }

    #[test]
    fn score_is_clamped_to_range() {
        let mut candidate = rated_candidate();
        candidate.name = "Restaurant".to_string();
        candidate.delivery_platforms[0].rating = None;
        candidate.planted_products.clear();
        candidate.dishes.clear();
        let (score, _) = score_candidate(
            &candidate,
            ScoreSignals {
                near_duplicate_exists: true,
                ..Default::default()
            },
        );
        assert!((0..=100).contains(&score));
    }
}
