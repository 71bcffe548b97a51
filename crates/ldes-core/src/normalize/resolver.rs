use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::taxonomy::{CanonicalEntity, EntityClass, Taxonomy};

/// Trailing tokens dropped before tier-two comparison.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "llc",
    "llp",
    "lp",
    "ltd",
    "limited",
    "plc",
    "gmbh",
    "ag",
    "sa",
    "nv",
    "holdings",
    "group",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Normalized,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRef {
    pub id: String,
    pub name: String,
}

impl From<&CanonicalEntity> for CanonicalRef {
    fn from(entity: &CanonicalEntity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Nothing cleared the similarity floor
    NoMatch,
    /// Several identities matched equally well
    Ambiguous,
    /// Empty after normalization
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        canonical: CanonicalRef,
        confidence: f64,
        tier: MatchTier,
    },
    Unresolved {
        reason: UnresolvedReason,
    },
}

impl Resolution {
    #[must_use]
    pub fn canonical(&self) -> Option<&CanonicalRef> {
        match self {
            Self::Resolved { canonical, .. } => Some(canonical),
            Self::Unresolved { .. } => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierOutcome {
    Match { index: usize, score: f64 },
    Ambiguous,
    NoMatch,
}

pub trait TierMatcher: Send + Sync {
    fn tier(&self) -> MatchTier;

    fn find_match(&self, mention: &str, entries: &[CanonicalEntity]) -> TierOutcome;
}

/// Lowercase, strip punctuation and trailing corporate suffixes.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();

    if tokens.len() > 1 && tokens[0] == "the" {
        tokens.remove(0);
    }
    while tokens.len() > 1 && tokens.last().is_some_and(|t| CORPORATE_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

fn fold(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Collapse per-entity hits into a single outcome. Distinct entities hitting
/// equally make the mention ambiguous.
fn single_hit(hits: &[usize], score: f64) -> TierOutcome {
    match hits {
        [] => TierOutcome::NoMatch,
        [index] => TierOutcome::Match {
            index: *index,
            score,
        },
        _ => TierOutcome::Ambiguous,
    }
}

pub struct ExactMatcher;

impl TierMatcher for ExactMatcher {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn find_match(&self, mention: &str, entries: &[CanonicalEntity]) -> TierOutcome {
        let mention = fold(mention);
        let hits: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.surface_forms().any(|form| fold(form) == mention))
            .map(|(i, _)| i)
            .collect();
        single_hit(&hits, 1.0)
    }
}

pub struct NormalizedMatcher;

impl TierMatcher for NormalizedMatcher {
    fn tier(&self) -> MatchTier {
        MatchTier::Normalized
    }

    fn find_match(&self, mention: &str, entries: &[CanonicalEntity]) -> TierOutcome {
        let mention = normalize_name(mention);
        if mention.is_empty() {
            return TierOutcome::NoMatch;
        }
        let hits: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.surface_forms().any(|form| normalize_name(form) == mention))
            .map(|(i, _)| i)
            .collect();
        single_hit(&hits, 0.95)
    }
}

pub struct FuzzyMatcher {
    floor: f64,
    margin: f64,
    min_len: usize,
}

impl FuzzyMatcher {
    #[must_use]
    pub fn new(floor: f64, margin: f64, min_len: usize) -> Self {
        Self {
            floor,
            margin,
            min_len,
        }
    }

    #[must_use]
    pub fn similarity(a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(&normalize_name(a), &normalize_name(b))
    }
}

impl TierMatcher for FuzzyMatcher {
    fn tier(&self) -> MatchTier {
        MatchTier::Fuzzy
    }

    fn find_match(&self, mention: &str, entries: &[CanonicalEntity]) -> TierOutcome {
        let normalized = normalize_name(mention);
        if normalized.chars().count() < self.min_len {
            return TierOutcome::NoMatch;
        }

        let mut scored: Vec<(usize, f64)> = entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                let best = e
                    .surface_forms()
                    .map(|form| strsim::normalized_levenshtein(&normalized, &normalize_name(form)))
                    .fold(0.0_f64, f64::max);
                (best >= self.floor).then_some((i, best))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        match scored.as_slice() {
            [] => TierOutcome::NoMatch,
            [(index, score)] => TierOutcome::Match {
                index: *index,
                score: *score,
            },
            [(index, score), (_, runner_up), ..] => {
                if score - runner_up < self.margin {
                    TierOutcome::Ambiguous
                } else {
                    TierOutcome::Match {
                        index: *index,
                        score: *score,
                    }
                }
            }
        }
    }
}

/// Maps free-text mentions to canonical identities.
///
/// Tiers run in order and stop at the first match or ambiguity. Resolution
/// depends only on the mention and the taxonomy.
pub struct EntityResolver {
    taxonomy: Arc<Taxonomy>,
    tiers: Vec<Box<dyn TierMatcher>>,
}

impl EntityResolver {
    #[must_use]
    pub fn new(taxonomy: Arc<Taxonomy>, config: &ResolverConfig) -> Self {
        Self {
            taxonomy,
            tiers: vec![
                Box::new(ExactMatcher),
                Box::new(NormalizedMatcher),
                Box::new(FuzzyMatcher::new(
                    config.similarity_floor,
                    config.ambiguity_margin,
                    config.min_fuzzy_len,
                )),
            ],
        }
    }

    #[must_use]
    pub fn resolve(&self, mention: &str, class: EntityClass) -> Resolution {
        if normalize_name(mention).is_empty() {
            return Resolution::Unresolved {
                reason: UnresolvedReason::Empty,
            };
        }

        let entries = self.taxonomy.entries(class);
        for matcher in &self.tiers {
            match matcher.find_match(mention, entries) {
                TierOutcome::Match { index, score } => {
                    tracing::debug!(
                        mention,
                        class = %class,
                        tier = ?matcher.tier(),
                        canonical = %entries[index].name,
                        "Resolved mention"
                    );
                    return Resolution::Resolved {
                        canonical: CanonicalRef::from(&entries[index]),
                        confidence: score,
                        tier: matcher.tier(),
                    };
                }
                TierOutcome::Ambiguous => {
                    return Resolution::Unresolved {
                        reason: UnresolvedReason::Ambiguous,
                    };
                }
                TierOutcome::NoMatch => {}
            }
        }

        Resolution::Unresolved {
            reason: UnresolvedReason::NoMatch,
        }
    }
}
