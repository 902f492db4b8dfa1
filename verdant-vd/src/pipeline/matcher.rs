//! Dedup/chain matcher
//!
//! Reconciles a normalized candidate against what the store already knows:
//! an exact (name, city) match within the same country is the same physical
//! venue seen via another platform; a matching chain name links the
//! candidate as a sibling location; anything else is a brand-new venue.
//!
//! The matcher is conservative: it never matches across country borders,
//! and URL overlap alone is never proof of identity (platforms redirect and
//! alias). When several chains are equally likely it refuses to guess and
//! classifies as new, logging the ambiguity for later manual merge.

use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::discovered_venues::ChainGroup;
use crate::db::{self, normalize_key, StoreError};
use crate::models::DiscoveredVenueCandidate;

/// Minimum normalized Levenshtein similarity for a fuzzy chain name match
const CHAIN_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Two chain matches closer than this are considered equally likely
const AMBIGUITY_MARGIN: f64 = 0.02;

/// Classification of a candidate against existing records
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// No existing record matches; insert as a new discovered venue
    NewVenue,
    /// Same physical venue already in the review queue; merge platform
    /// links and dishes into it
    MergeIntoExisting { venue_id: Uuid },
    /// A sibling location of a known chain in the same country
    LinkAsChainSibling { chain_id: Uuid, chain_name: String },
}

/// Context the classifier gathered along the way, fed to the scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext {
    /// An exact production venue match exists (promotion dedupe will catch
    /// it; scored as a near-duplicate)
    pub production_duplicate: bool,
    /// The chain name matched exactly (not just fuzzily)
    pub exact_chain_match: bool,
}

/// Classify a candidate against the discovered and production stores.
pub async fn classify(
    pool: &SqlitePool,
    candidate: &DiscoveredVenueCandidate,
) -> Result<(MatchDecision, MatchContext), StoreError> {
    let country = candidate.address.country.as_str();
    let mut context = MatchContext::default();

    // Exact physical identity: (name, city) within the same country
    if !candidate.name.is_empty() && !candidate.address.city.is_empty() {
        if let Some((venue_id, status)) =
            db::discovered_venues::find_exact(pool, &candidate.name, &candidate.address.city, country)
                .await?
        {
            debug!(
                venue_id = %venue_id,
                status = status.as_str(),
                "exact match in review queue"
            );
            return Ok((MatchDecision::MergeIntoExisting { venue_id }, context));
        }

        // Production records created outside the pipeline have no review
        // queue counterpart; promotion dedupes by the same natural key, so
        // the candidate stays new but scores as a near-duplicate.
        if db::venues::find_by_name_city(pool, &candidate.name, &candidate.address.city, country)
            .await?
            .is_some()
        {
            debug!(name = %candidate.name, "exact match in production store only");
            context.production_duplicate = true;
        }
    }

    // Chain sibling: matching chain name within the same country
    let chains = db::discovered_venues::chains_in_country(pool, country).await?;
    match find_chain_match(&candidate.name, &chains) {
        ChainMatchOutcome::Match {
            chain_id,
            chain_name,
            exact,
        } => {
            context.exact_chain_match = exact;
            return Ok((
                MatchDecision::LinkAsChainSibling {
                    chain_id,
                    chain_name,
                },
                context,
            ));
        }
        ChainMatchOutcome::Ambiguous { candidates } => {
            // Refuse to guess; a human can merge later
            warn!(
                name = %candidate.name,
                country = country,
                candidates = ?candidates,
                "ambiguous chain match, defaulting to new venue"
            );
        }
        ChainMatchOutcome::None => {}
    }

    Ok((MatchDecision::NewVenue, context))
}

/// Outcome of matching a candidate name against known chains
#[derive(Debug, Clone, PartialEq)]
pub enum ChainMatchOutcome {
    None,
    Match {
        chain_id: Uuid,
        chain_name: String,
        exact: bool,
    },
    Ambiguous {
        candidates: Vec<String>,
    },
}

/// Pure chain matching: exact normalized name, else fuzzy similarity above
/// the threshold. Several equally-likely chains count as ambiguous.
pub fn find_chain_match(name: &str, chains: &[ChainGroup]) -> ChainMatchOutcome {
    let name_key = normalize_key(name);
    if name_key.is_empty() || chains.is_empty() {
        return ChainMatchOutcome::None;
    }

    let mut scored: Vec<(f64, bool, &ChainGroup)> = Vec::new();
    for chain in chains {
        let chain_key = normalize_key(&chain.chain_name);
        if chain_key == name_key {
            scored.push((1.0, true, chain));
            continue;
        }
        let similarity = strsim::normalized_levenshtein(&name_key, &chain_key);
        if similarity >= CHAIN_SIMILARITY_THRESHOLD {
            scored.push((similarity, false, chain));
        }
    }

    if scored.is_empty() {
        return ChainMatchOutcome::None;
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let (best_score, best_exact, best) = (scored[0].0, scored[0].1, scored[0].2);

    let rivals: Vec<String> = scored
        .iter()
        .skip(1)
        .filter(|(score, _, chain)| {
            best_score - score < AMBIGUITY_MARGIN && chain.chain_id != best.chain_id
        })
        .map(|(_, _, chain)| chain.chain_name.clone())
        .collect();

    if !rivals.is_empty() {
        let mut candidates = vec![best.chain_name.clone()];
        candidates.extend(rivals);
        return ChainMatchOutcome::Ambiguous { candidates };
    }

    ChainMatchOutcome::Match {
        chain_id: best.chain_id,
        chain_name: best.chain_name.clone(),
        exact: best_exact,
    }
}
