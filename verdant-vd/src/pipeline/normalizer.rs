//! Candidate normalizer
//!
//! Converts a per-platform scrape record into the canonical candidate
//! shape: normalized address, canonicalized platform URLs, and a first-pass
//! product set from keyword matching against dish names and descriptions.
//! Pure transform, no side effects.

use thiserror::Error;

use crate::models::candidate::{
    DiscoveredVenueCandidate, GenericDish, LieferandoDish, ScrapeRecord, UberMenuItem,
    WoltMenuItem,
};
use crate::models::{Address, Coordinates, DeliveryPlatform, DishCandidate, PlatformLink};

/// Normalizer rejection. The candidate is dropped and logged, never stored.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed candidate: missing both name and delivery platform links")]
    MalformedCandidate,
}

/// Keyword → product SKU table, matched case-insensitively as substrings
/// against dish names and descriptions.
const KEYWORD_SKUS: &[(&str, &str)] = &[
    ("planted.chicken", "planted.chicken"),
    ("planted chicken", "planted.chicken"),
    ("planted.pulled", "planted.pulled"),
    ("planted pulled", "planted.pulled"),
    ("planted.kebab", "planted.kebab"),
    ("planted kebab", "planted.kebab"),
    ("planted.schnitzel", "planted.schnitzel"),
    ("planted schnitzel", "planted.schnitzel"),
    ("planted.bratwurst", "planted.bratwurst"),
    ("planted bratwurst", "planted.bratwurst"),
    ("planted.duck", "planted.duck"),
    ("planted duck", "planted.duck"),
    ("planted.steak", "planted.steak"),
    ("planted steak", "planted.steak"),
];

/// Brand mention without a specific product; maps to the configured
/// fallback SKU.
const GENERIC_BRAND_KEYWORD: &str = "planted";

/// Dish-level confidence assigned on keyword matches
const SPECIFIC_MATCH_CONFIDENCE: i64 = 90;
const GENERIC_MATCH_CONFIDENCE: i64 = 60;

/// Normalize a raw scrape record into a candidate.
pub fn normalize(
    record: ScrapeRecord,
    fallback_sku: &str,
) -> Result<DiscoveredVenueCandidate, NormalizeError> {
    let candidate = match record {
        ScrapeRecord::Wolt {
            name,
            city,
            post_code,
            country,
            address,
            location,
            url,
            rating,
            items,
        } => {
            let platforms = platform_links(
                DeliveryPlatform::Wolt,
                url,
                rating.as_ref().map(|r| r.score),
                rating.as_ref().and_then(|r| r.volume),
            );
            DiscoveredVenueCandidate {
                name: clean_name(name),
                address: normalize_address(address, city, post_code, country),
                coordinates: location.map(|l| Coordinates { lat: l.lat, lng: l.lon }),
                dishes: wolt_dishes(&items, fallback_sku),
                planted_products: vec![],
                delivery_platforms: platforms,
            }
        }
        ScrapeRecord::Lieferando {
            restaurant_name,
            street,
            city,
            zipcode,
            country_code,
            latitude,
            longitude,
            url,
            rating_stars,
            rating_count,
            menu,
        } => {
            let platforms =
                platform_links(DeliveryPlatform::Lieferando, url, rating_stars, rating_count);
            DiscoveredVenueCandidate {
                name: clean_name(restaurant_name),
                address: normalize_address(street, city, zipcode, country_code),
                coordinates: coordinates_from(latitude, longitude),
                dishes: lieferando_dishes(&menu, fallback_sku),
                planted_products: vec![],
                delivery_platforms: platforms,
            }
        }
        ScrapeRecord::UberEats {
            title,
            location,
            url,
            rating,
            review_count,
            menu_items,
        } => {
            let platforms = platform_links(DeliveryPlatform::UberEats, url, rating, review_count);
            let (street, city, postal_code, country, lat, lng) = match location {
                Some(l) => (l.address, l.city, l.postal_code, l.country_code, l.latitude, l.longitude),
                None => (None, None, None, None, None, None),
            };
            DiscoveredVenueCandidate {
                name: clean_name(title),
                address: normalize_address(street, city, postal_code, country),
                coordinates: coordinates_from(lat, lng),
                dishes: uber_dishes(&menu_items, fallback_sku),
                planted_products: vec![],
                delivery_platforms: platforms,
            }
        }
        ScrapeRecord::Generic {
            name,
            address,
            coordinates,
            delivery_platforms,
            dishes,
        } => {
            let address = match address {
                Some(a) => normalize_address(a.street, Some(a.city), a.postal_code, Some(a.country)),
                None => normalize_address(None, None, None, None),
            };
            DiscoveredVenueCandidate {
                name: clean_name(name),
                address,
                coordinates,
                dishes: generic_dishes(&dishes, fallback_sku),
                planted_products: vec![],
                delivery_platforms: dedupe_platforms(
                    delivery_platforms
                        .into_iter()
                        .map(|mut link| {
                            link.url = canonicalize_url(&link.url);
                            link
                        })
                        .collect(),
                ),
            }
        }
    };

    let mut candidate = candidate;

    // Venue-level product set derived from the detected dishes
    for dish in &candidate.dishes {
        if !candidate.planted_products.contains(&dish.product) {
            candidate.planted_products.push(dish.product.clone());
        }
    }

    if candidate.name.is_empty() && candidate.delivery_platforms.is_empty() {
        return Err(NormalizeError::MalformedCandidate);
    }

    Ok(candidate)
}

/// Match a dish name/description against the keyword table.
///
/// A specific keyword wins over the generic brand keyword; no match at all
/// means the dish is not a target-brand dish.
pub fn detect_product(text: &str, fallback_sku: &str) -> Option<(String, i64)> {
    let haystack = text.to_lowercase();
    for (keyword, sku) in KEYWORD_SKUS {
        if haystack.contains(keyword) {
            return Some((sku.to_string(), SPECIFIC_MATCH_CONFIDENCE));
        }
    }
    if haystack.contains(GENERIC_BRAND_KEYWORD) {
        return Some((fallback_sku.to_string(), GENERIC_MATCH_CONFIDENCE));
    }
    None
}

fn clean_name(name: Option<String>) -> String {
    name.map(|n| n.trim().to_string()).unwrap_or_default()
}

fn normalize_address(
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
) -> Address {
    Address {
        street: street.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        city: city.map(|c| c.trim().to_string()).unwrap_or_default(),
        postal_code: postal_code
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        // ZZ is the ISO 3166 user-assigned code for "unknown region"
        country: country
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "ZZ".to_string()),
    }
}

fn coordinates_from(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinates> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
        _ => None,
    }
}

fn platform_links(
    platform: DeliveryPlatform,
    url: Option<String>,
    rating: Option<f64>,
    review_count: Option<i64>,
) -> Vec<PlatformLink> {
    match url {
        Some(url) if !url.trim().is_empty() => vec![PlatformLink {
            platform,
            url: canonicalize_url(&url),
            rating,
            review_count,
        }],
        _ => vec![],
    }
}

/// Trim whitespace and a trailing slash; platforms alias the same venue
/// under both forms.
fn canonicalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn dedupe_platforms(links: Vec<PlatformLink>) -> Vec<PlatformLink> {
    let mut seen = std::collections::HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.platform))
        .collect()
}

fn wolt_dishes(items: &[WoltMenuItem], fallback_sku: &str) -> Vec<DishCandidate> {
    items
        .iter()
        .filter_map(|item| {
            let text = match &item.description {
                Some(d) => format!("{} {}", item.name, d),
                None => item.name.clone(),
            };
            detect_product(&text, fallback_sku).map(|(product, confidence)| DishCandidate {
                name: item.name.trim().to_string(),
                price: item.baseprice.clone(),
                product,
                description: item.description.clone(),
                confidence: Some(confidence),
            })
        })
        .collect()
}

fn lieferando_dishes(menu: &[LieferandoDish], fallback_sku: &str) -> Vec<DishCandidate> {
    menu.iter()
        .filter_map(|dish| {
            let text = match &dish.description {
                Some(d) => format!("{} {}", dish.title, d),
                None => dish.title.clone(),
            };
            detect_product(&text, fallback_sku).map(|(product, confidence)| DishCandidate {
                name: dish.title.trim().to_string(),
                price: dish.price.clone(),
                product,
                description: dish.description.clone(),
                confidence: Some(confidence),
            })
        })
        .collect()
}

fn uber_dishes(items: &[UberMenuItem], fallback_sku: &str) -> Vec<DishCandidate> {
    items
        .iter()
        .filter_map(|item| {
            let text = match &item.item_description {
                Some(d) => format!("{} {}", item.name, d),
                None => item.name.clone(),
            };
            detect_product(&text, fallback_sku).map(|(product, confidence)| DishCandidate {
                name: item.name.trim().to_string(),
                price: item.price_formatted.clone(),
                product,
                description: item.item_description.clone(),
                confidence: Some(confidence),
            })
        })
        .collect()
}

fn generic_dishes(dishes: &[GenericDish], fallback_sku: &str) -> Vec<DishCandidate> {
    dishes
        .iter()
        .filter_map(|dish| {
            let text = match &dish.description {
                Some(d) => format!("{} {}", dish.name, d),
                None => dish.name.clone(),
            };
            detect_product(&text, fallback_sku).map(|(product, confidence)| DishCandidate {
                name: dish.name.trim().to_string(),
                price: dish.price.clone(),
                product,
                description: dish.description.clone(),
                confidence: Some(confidence),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::WoltRating;

    const FALLBACK: &str = "planted.chicken";

    fn wolt_record() -> ScrapeRecord {
        ScrapeRecord::Wolt {
            name: Some("Tibits ".to_string()),
            city: Some("Basel".to_string()),
            post_code: Some("4051".to_string()),
            country: Some("ch".to_string()),
            address: Some("Stänzlergasse 4".to_string()),
            location: None,
            url: Some("https://wolt.com/de/che/basel/restaurant/tibits/".to_string()),
            rating: Some(WoltRating {
                score: 4.4,
                volume: Some(312),
            }),
            items: vec![
                WoltMenuItem {
                    name: "planted.chicken Curry".to_string(),
                    baseprice: Some("24.50 CHF".to_string()),
                    description: None,
                },
                WoltMenuItem {
                    name: "Caesar Salad".to_string(),
                    baseprice: Some("18.00 CHF".to_string()),
                    description: Some("with planted strips".to_string()),
                },
                WoltMenuItem {
                    name: "Pommes Frites".to_string(),
                    baseprice: Some("8.50 CHF".to_string()),
                    description: None,
                },
            ],
        }
    }

    #[test]
    fn wolt_record_is_normalized() {
        let candidate = normalize(wolt_record(), FALLBACK).unwrap();

        assert_eq!(candidate.name, "Tibits");
        assert_eq!(candidate.address.city, "Basel");
        assert_eq!(candidate.address.country, "CH");
        assert_eq!(candidate.delivery_platforms.len(), 1);
        // Trailing slash stripped
        assert!(!candidate.delivery_platforms[0].url.ends_with('/'));
        assert_eq!(candidate.delivery_platforms[0].rating, Some(4.4));

        // Two of three menu items match; fries are dropped
        assert_eq!(candidate.dishes.len(), 2);
        assert_eq!(candidate.dishes[0].product, "planted.chicken");
        assert_eq!(candidate.dishes[0].price.as_deref(), Some("24.50 CHF"));
        // Generic brand mention falls back to the configured SKU
        assert_eq!(candidate.dishes[1].product, FALLBACK);
        assert_eq!(candidate.planted_products, vec!["planted.chicken"]);
    }

    #[test]
    fn missing_name_and_platforms_is_malformed() {
        let record = ScrapeRecord::Wolt {
            name: None,
            city: Some("Basel".to_string()),
            post_code: None,
            country: Some("CH".to_string()),
            address: None,
            location: None,
            url: None,
            rating: None,
            items: vec![],
        };
        assert!(matches!(
            normalize(record, FALLBACK),
            Err(NormalizeError::MalformedCandidate)
        ));
    }

    #[test]
    fn name_alone_is_sufficient() {
        let record = ScrapeRecord::Generic {
            name: Some("Hiltl".to_string()),
            address: None,
            coordinates: None,
            delivery_platforms: vec![],
            dishes: vec![],
        };
        let candidate = normalize(record, FALLBACK).unwrap();
        assert_eq!(candidate.name, "Hiltl");
        assert_eq!(candidate.address.country, "ZZ");
    }

    #[test]
    fn specific_keyword_beats_generic() {
        assert_eq!(
            detect_product("Planted Kebab Dürüm", FALLBACK),
            Some(("planted.kebab".to_string(), 90))
        );
        assert_eq!(
            detect_product("bowl with planted protein", FALLBACK),
            Some((FALLBACK.to_string(), 60))
        );
        assert_eq!(detect_product("beef burger", FALLBACK), None);
    }

    #[test]
    fn generic_variant_dedupes_platforms() {
        let record = ScrapeRecord::Generic {
            name: Some("Tibits".to_string()),
            address: None,
            coordinates: None,
            delivery_platforms: vec![
                PlatformLink {
                    platform: DeliveryPlatform::Smood,
                    url: "https://smood.ch/tibits/".to_string(),
                    rating: None,
                    review_count: None,
                },
                PlatformLink {
                    platform: DeliveryPlatform::Smood,
                    url: "https://smood.ch/tibits-basel".to_string(),
                    rating: None,
                    review_count: None,
                },
            ],
            dishes: vec![],
        };
        let candidate = normalize(record, FALLBACK).unwrap();
        assert_eq!(candidate.delivery_platforms.len(), 1);
        assert_eq!(candidate.delivery_platforms[0].url, "https://smood.ch/tibits");
    }
}
