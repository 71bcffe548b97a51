//! Per-field merge of extractor spans.
//!
//! Every field's candidates are reduced by one deterministic function. The
//! candidates are sorted before anything is decided, so the outcome does not
//! depend on which extractor finished first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::extractor::RawSpan;
use crate::config::TrustThresholds;
use crate::field::{Field, FieldKind, SpanSource};
use crate::normalize::resolver::normalize_name;
use crate::normalize::timeline::parse_date;
use crate::normalize::units::{parse_money_musd, parse_quantity, Dimension};
use crate::normalize::EntityResolver;
use crate::record::Provenance;
use crate::taxonomy::EntityClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// No extractor produced a value
    Missing,
    /// Extractors produced different values
    Conflict,
    /// A single uncontested value below the field's trust threshold
    LowConfidence,
}

impl EscalationReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Conflict => "conflict",
            Self::LowConfidence => "low_confidence",
        }
    }
}

/// One extracted value with the key it is compared under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    pub key: String,
    pub source: SpanSource,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FieldDecision {
    Accepted {
        value: String,
        confidence: f64,
        sources: Vec<SpanSource>,
    },
    Escalate {
        reason: EscalationReason,
        candidates: Vec<Candidate>,
    },
}

/// Merged state for one document. Never shared between documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRecord {
    pub fields: BTreeMap<Field, FieldDecision>,
}

impl CandidateRecord {
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldDecision> {
        self.fields.get(&field)
    }

    /// Fields settled by merging alone, with where their value came from.
    pub fn accepted(&self) -> impl Iterator<Item = (Field, &str, Provenance)> {
        self.fields.iter().filter_map(|(field, decision)| match decision {
            FieldDecision::Accepted {
                value,
                confidence,
                sources,
            } => Some((
                *field,
                value.as_str(),
                Provenance {
                    sources: sources.clone(),
                    confidence: *confidence,
                },
            )),
            FieldDecision::Escalate { .. } => None,
        })
    }

    pub fn escalations(&self) -> impl Iterator<Item = (Field, EscalationReason, &[Candidate])> {
        self.fields.iter().filter_map(|(field, decision)| match decision {
            FieldDecision::Escalate { reason, candidates } => {
                Some((*field, *reason, candidates.as_slice()))
            }
            FieldDecision::Accepted { .. } => None,
        })
    }
}

/// Computes the comparison key of a value: two values agree when their keys
/// are equal.
pub struct ValueKeyer<'a> {
    resolver: &'a EntityResolver,
}

impl<'a> ValueKeyer<'a> {
    #[must_use]
    pub fn new(resolver: &'a EntityResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn key(&self, field: Field, value: &str) -> String {
        let quantity = |dim: Dimension| {
            parse_quantity(value, dim).map_or_else(
                |_| format!("raw:{}", normalize_name(value)),
                |q| format!("{:.6}", q.value),
            )
        };
        let entity = |class: EntityClass| {
            self.resolver.resolve(value, class).canonical().map_or_else(
                || format!("mention:{}", normalize_name(value)),
                |c| format!("id:{}", c.id),
            )
        };

        match field.kind() {
            FieldKind::Power => quantity(Dimension::Power),
            FieldKind::Energy => quantity(Dimension::Energy),
            FieldKind::Duration => quantity(Dimension::Duration),
            FieldKind::Money => parse_money_musd(value).map_or_else(
                |_| format!("raw:{}", normalize_name(value)),
                |musd| format!("{musd:.6}"),
            ),
            FieldKind::Company => entity(EntityClass::Company),
            FieldKind::Technology => entity(EntityClass::Technology),
            FieldKind::Milestone => parse_date(value)
                .map_or_else(|| format!("raw:{}", normalize_name(value)), |d| d.to_string()),
            FieldKind::Text => normalize_name(value),
        }
    }
}

fn order(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    a.key
        .cmp(&b.key)
        .then(a.source.cmp(&b.source))
        .then(a.start.cmp(&b.start))
        .then(a.end.cmp(&b.end))
        .then(a.value.cmp(&b.value))
        .then(a.confidence.total_cmp(&b.confidence))
}

/// Decide one field from its candidates.
///
/// Agreement between the rule and recognizer sources is accepted outright at
/// the higher of the two confidences. A value from a single source is accepted
/// only at or above `threshold`. Any disagreement is escalated.
#[must_use]
pub fn merge_field(mut candidates: Vec<Candidate>, threshold: f64) -> FieldDecision {
    if candidates.is_empty() {
        return FieldDecision::Escalate {
            reason: EscalationReason::Missing,
            candidates,
        };
    }
    candidates.sort_by(order);

    let keys: BTreeSet<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
    if keys.len() > 1 {
        return FieldDecision::Escalate {
            reason: EscalationReason::Conflict,
            candidates,
        };
    }

    let sources: Vec<SpanSource> = candidates
        .iter()
        .map(|c| c.source)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let corroborated =
        sources.contains(&SpanSource::Rule) && sources.contains(&SpanSource::Recognizer);

    let Some(best) = candidates
        .iter()
        .reduce(|best, c| if c.confidence > best.confidence { c } else { best })
    else {
        return FieldDecision::Escalate {
            reason: EscalationReason::Missing,
            candidates,
        };
    };

    if corroborated || best.confidence >= threshold {
        FieldDecision::Accepted {
            value: best.value.clone(),
            confidence: best.confidence,
            sources,
        }
    } else {
        FieldDecision::Escalate {
            reason: EscalationReason::LowConfidence,
            candidates,
        }
    }
}

/// Group spans by field and merge each group. Fields with no span are
/// recorded as missing.
#[must_use]
pub fn merge(spans: &[RawSpan], thresholds: &TrustThresholds, keyer: &ValueKeyer<'_>) -> CandidateRecord {
    let mut grouped: BTreeMap<Field, Vec<Candidate>> =
        Field::ALL.into_iter().map(|f| (f, Vec::new())).collect();

    for span in spans {
        grouped.entry(span.field).or_default().push(Candidate {
            key: keyer.key(span.field, &span.text),
            value: span.text.clone(),
            source: span.source,
            confidence: span.confidence,
            start: span.start,
            end: span.end,
        });
    }

    let fields = grouped
        .into_iter()
        .map(|(field, candidates)| {
            let decision = merge_field(candidates, thresholds.for_field(field));
            if let FieldDecision::Escalate { reason, candidates } = &decision {
                if *reason != EscalationReason::Missing {
                    tracing::debug!(
                        field = %field,
                        reason = reason.as_str(),
                        candidates = candidates.len(),
                        "Escalating field"
                    );
                }
            }
            (field, decision)
        })
        .collect();

    CandidateRecord { fields }
}
