//! Deterministic pattern rules.
//!
//! A rule is data: a field, a regex and the capture group holding the value.
//! Rules either match cleanly or decline. A rule may name a reject group; when
//! that group takes part in a match the match is dropped (the regex engine has
//! no lookaround, so "100 megawatt-hours" is kept out of the power rule this
//! way).
//!
//! Rules carry a precedence. For each field only the hits of the highest
//! precedence that matched are kept, so a labelled "Project name:" line
//! outranks a name guessed from surrounding prose.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::extractor::{ExtractionResult, Extractor, RawSpan};
use crate::field::{Field, SpanSource};
use crate::text;

const NUM: &str = r"\d[\d,]*(?:\.\d+)?";
const RANGE: &str = r"(?:\s*(?:-|–|—|to)\s*\d[\d,]*(?:\.\d+)?)?";

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid pattern for {field}: {source}")]
    Pattern {
        field: Field,
        #[source]
        source: regex::Error,
    },
    #[error("Pattern for {field} has no capture group {group}")]
    MissingGroup { field: Field, group: usize },
    #[error("Rule confidence {0} outside [0, 1]")]
    Confidence(f64),
    #[error("Malformed rule file: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type RuleResult<T> = Result<T, RuleError>;

/// Precedence of the built-in `Label: value` rules.
pub const LABEL_PRECEDENCE: u8 = 10;

fn default_value_group() -> usize {
    1
}

/// Serializable description of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub field: Field,
    pub pattern: String,
    #[serde(default = "default_value_group")]
    pub value_group: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_group: Option<usize>,
    /// Overrides the engine-wide rule confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Within one field, hits from higher-precedence rules replace the rest
    #[serde(default)]
    pub precedence: u8,
}

impl RuleSpec {
    #[must_use]
    pub fn new(field: Field, pattern: impl Into<String>) -> Self {
        Self {
            field,
            pattern: pattern.into(),
            value_group: 1,
            reject_group: None,
            confidence: None,
            precedence: 0,
        }
    }

    #[must_use]
    pub fn with_value_group(mut self, group: usize) -> Self {
        self.value_group = group;
        self
    }

    #[must_use]
    pub fn with_reject_group(mut self, group: usize) -> Self {
        self.reject_group = Some(group);
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn with_precedence(mut self, precedence: u8) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn compile(&self, default_confidence: f64) -> RuleResult<ExtractionRule> {
        let regex = Regex::new(&self.pattern).map_err(|source| RuleError::Pattern {
            field: self.field,
            source,
        })?;

        let groups = regex.captures_len();
        for group in std::iter::once(self.value_group).chain(self.reject_group) {
            if group == 0 || group >= groups {
                return Err(RuleError::MissingGroup {
                    field: self.field,
                    group,
                });
            }
        }

        let confidence = self.confidence.unwrap_or(default_confidence);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RuleError::Confidence(confidence));
        }

        Ok(ExtractionRule {
            field: self.field,
            regex,
            value_group: self.value_group,
            reject_group: self.reject_group,
            confidence,
            precedence: self.precedence,
        })
    }

    /// Parse a JSON array of rule specs.
    pub fn from_json(json: &str) -> RuleResult<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// The built-in rule table, one or more patterns per field family.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        let label = |field: Field, names: &str| {
            Self::new(field, format!(r"(?im)^[ \t]*(?:{names})[ \t]*:[ \t]*(\S[^\n]*?)[ \t]*$"))
                .with_precedence(LABEL_PRECEDENCE)
        };

        vec![
            // Project name
            label(Field::ProjectName, r"project(?:\s+name)?|name\s+of\s+project"),
            Self::new(
                Field::ProjectName,
                r"\b(Project\s+[A-Z][\w'-]*(?:\s+[A-Z][\w'-]*){0,3})\b(\s*:)?",
            )
            .with_reject_group(2),
            Self::new(
                Field::ProjectName,
                r"\b(?:[Tt]he\s+)?((?:[A-Z][\w'-]+\s+){1,4}(?:Energy\s+)?(?:Storage|Battery)\s+(?:Project|Facility|Center|Centre|Plant|Station))\b",
            ),
            // Capacity
            Self::new(
                Field::CapacityMw,
                format!(
                    r"(?i)\b({NUM}{RANGE}\s*(?:MW(?:e|ac)?|GW|kW(?:e)?|megawatts?|gigawatts?|kilowatts?))\b([\s-]*hours?\b|[\s-]*hrs?\b)?"
                ),
            )
            .with_reject_group(2),
            Self::new(
                Field::CapacityMwh,
                format!(
                    r"(?i)\b({NUM}{RANGE}\s*(?:MWh|GWh|kWh|megawatt[\s-]hours?|gigawatt[\s-]hours?|kilowatt[\s-]hours?))\b"
                ),
            ),
            Self::new(
                Field::DurationHours,
                format!(r"(?i)\b({NUM}{RANGE}\s*-?\s*(?:hours?|hrs?|h))\b"),
            ),
            // Technology
            label(Field::Technology, r"technology|storage\s+type"),
            Self::new(
                Field::Technology,
                r"(?i)\b(iron[\s-]air|lithium[\s-]ion|li-ion|LFP|vanadium\s+redox(?:\s+flow)?|vanadium\s+flow|VRFB|iron[\s-]flow|zinc[\s-]bromine|zinc[\s-]air|sodium[\s-]ion|sodium[\s-]sulfur|liquid[\s-]metal|compressed[\s-]air|A-CAES|CAES|liquid[\s-]air|LAES|pumped[\s-](?:storage|hydro)|PSH|thermal\s+(?:energy\s+)?storage|molten\s+salt|gravity(?:[\s-]based)?\s+storage|CO2\s+battery)\b",
            ),
            // Developer
            label(Field::Developer, r"developer|developed\s+by|owner|sponsor"),
            Self::new(
                Field::Developer,
                r"\b(?:developed|built|owned|operated|led|sponsored)\s+by\s+([A-Z][\w&.'-]*(?:\s+(?:[A-Z][\w&.'-]*|&))*)",
            ),
            // Location
            label(Field::Location, r"location|site|project\s+location"),
            Self::new(
                Field::Location,
                r"\b(?:located|sited|situated|based)\s+(?:in|near|at)\s+([A-Z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*(?:,\s*[A-Z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*)?)",
            ),
            Self::new(
                Field::Location,
                r"\b(?:in|near)\s+(?:(January|February|March|April|May|June|July|August|September|October|November|December|Q[1-4])\b|([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*,\s*(?:[A-Z]{2}|[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?))\b)",
            )
            .with_value_group(2)
            .with_reject_group(1),
            // Capital cost
            label(Field::Capex, r"total\s+cost(?:\s*\(capex\))?|capex|capital\s+cost|project\s+cost"),
            Self::new(
                Field::Capex,
                format!(
                    r"(?i)\b(?:cost|costs|capex|investment|invest|valued\s+at|worth|price\s+tag|budget)\b[^$\n.]{{0,40}}?((?:US\$|USD|\$)\s*{NUM}\s*(?:billion|bn|million|mn|mm|m|thousand|k)?)\b"
                ),
            ),
            // Labelled milestones
            label(Field::AnnouncedDate, r"announced|announcement(?:\s+date)?"),
            label(
                Field::PermittedDate,
                r"permitted|permit(?:\s+date)?|approved|approval(?:\s+date)?",
            ),
            label(
                Field::ConstructionDate,
                r"construction(?:\s+start)?|construction\s+begins?|groundbreaking",
            ),
            label(
                Field::OperationalDate,
                r"operational|in[\s-]service(?:\s+date)?|COD|commercial\s+operation(?:\s+date)?|expected\s+COD(?:\s+year)?|online",
            ),
        ]
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub field: Field,
    pub regex: Regex,
    pub value_group: usize,
    pub reject_group: Option<usize>,
    pub confidence: f64,
    pub precedence: u8,
}

impl ExtractionRule {
    #[must_use]
    pub fn apply(&self, text: &str) -> Vec<RawSpan> {
        let mut spans = Vec::new();
        for caps in self.regex.captures_iter(text) {
            if self.reject_group.is_some_and(|g| caps.get(g).is_some()) {
                continue;
            }
            let Some(value) = caps.get(self.value_group) else {
                continue;
            };
            let cleaned = text::clean_value(value.as_str());
            if cleaned.is_empty() {
                continue;
            }
            spans.push(
                RawSpan::new(self.field, cleaned, SpanSource::Rule, self.confidence).at(
                    text::char_offset(text, value.start()),
                    text::char_offset(text, value.end()),
                ),
            );
        }
        spans
    }
}

pub struct RuleExtractor {
    rules: Vec<ExtractionRule>,
}

impl RuleExtractor {
    /// Compile every spec, skipping (and logging) the ones that fail.
    #[must_use]
    pub fn from_specs(specs: &[RuleSpec], default_confidence: f64) -> Self {
        let rules = specs
            .iter()
            .filter_map(|spec| match spec.compile(default_confidence) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(field = %spec.field, error = %e, "Skipping rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn with_default_rules(default_confidence: f64) -> Self {
        Self::from_specs(&RuleSpec::defaults(), default_confidence)
    }

    #[must_use]
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Apply every rule, keeping per field only the hits of the highest
    /// precedence that matched.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<RawSpan> {
        let hits: Vec<(u8, RawSpan)> = self
            .rules
            .iter()
            .flat_map(|rule| {
                let precedence = rule.precedence;
                rule.apply(text).into_iter().map(move |span| (precedence, span))
            })
            .collect();

        let mut top: BTreeMap<Field, u8> = BTreeMap::new();
        for (precedence, span) in &hits {
            let best = top.entry(span.field).or_insert(*precedence);
            *best = (*best).max(*precedence);
        }

        hits.into_iter()
            .filter(|(precedence, span)| top.get(&span.field) == Some(precedence))
            .map(|(_, span)| span)
            .collect()
    }
}

#[async_trait::async_trait]
impl Extractor for RuleExtractor {
    fn source(&self) -> SpanSource {
        SpanSource::Rule
    }

    async fn extract(&self, text: &str) -> ExtractionResult<Vec<RawSpan>> {
        Ok(self.scan(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(text: &str, field: Field) -> Vec<String> {
        RuleExtractor::with_default_rules(0.95)
            .scan(text)
            .into_iter()
            .filter(|s| s.field == field)
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn test_defaults_compile() {
        let specs = RuleSpec::defaults();
        let extractor = RuleExtractor::with_default_rules(0.95);
        assert_eq!(extractor.rules().len(), specs.len());
    }

    #[test]
    fn test_capacity_rules() {
        let text = "The 100 MW / 400 MWh system can discharge for 4 hours.";
        assert_eq!(values(text, Field::CapacityMw), vec!["100 MW"]);
        assert_eq!(values(text, Field::CapacityMwh), vec!["400 MWh"]);
        assert_eq!(values(text, Field::DurationHours), vec!["4 hours"]);
    }

    #[test]
    fn test_power_rule_rejects_energy_units() {
        assert!(values("storing 150 megawatt-hours", Field::CapacityMw).is_empty());
        assert_eq!(
            values("storing 150 megawatt-hours", Field::CapacityMwh),
            vec!["150 megawatt-hours"]
        );
        assert_eq!(values("a 100-120 MW plant", Field::CapacityMw), vec!["100-120 MW"]);
    }

    #[test]
    fn test_project_name_rules() {
        assert_eq!(
            values("Form Energy will build Project Alpha next year.", Field::ProjectName),
            vec!["Project Alpha"]
        );
        assert_eq!(
            values("Project name: Cambridge Energy Storage Project", Field::ProjectName),
            vec!["Cambridge Energy Storage Project"]
        );
    }

    #[test]
    fn test_labelled_name_outranks_prose() {
        let text = "Project name: Beta Storage\nThe Beta Storage Project is a 100 MW battery.";
        assert_eq!(values(text, Field::ProjectName), vec!["Beta Storage"]);

        // Without a label the prose patterns still apply.
        assert_eq!(
            values("The Beta Storage Project is a 100 MW battery.", Field::ProjectName),
            vec!["Beta Storage Project"]
        );
    }

    #[test]
    fn test_equal_precedence_hits_are_all_kept() {
        let text = "The filing lists 100 MW while the press release says 120 MW.";
        assert_eq!(values(text, Field::CapacityMw), vec!["100 MW", "120 MW"]);
    }

    #[test]
    fn test_developer_and_location_rules() {
        let text = "The facility, developed by Form Energy Inc., is located in Cambridge, Minnesota.";
        assert_eq!(values(text, Field::Developer), vec!["Form Energy Inc"]);
        assert!(values(text, Field::Location).contains(&"Cambridge, Minnesota".to_string()));

        let labels = "Developer: Hydrostor\nLocation: Kern County, CA";
        assert_eq!(values(labels, Field::Developer), vec!["Hydrostor"]);
        assert!(values(labels, Field::Location).contains(&"Kern County, CA".to_string()));
    }

    #[test]
    fn test_month_is_not_a_location() {
        assert!(values("It was announced in May, Form Energy said.", Field::Location).is_empty());
    }

    #[test]
    fn test_technology_and_capex() {
        let text = "The iron-air battery will cost $760 million to build.";
        assert_eq!(values(text, Field::Technology), vec!["iron-air"]);
        assert_eq!(values(text, Field::Capex), vec!["$760 million"]);
        assert!(values("a $2 grant", Field::Capex).is_empty());
    }

    #[test]
    fn test_labelled_milestones() {
        let text = "Announced: 2023\nOperational: 2025\nPermitted: 2026";
        assert_eq!(values(text, Field::AnnouncedDate), vec!["2023"]);
        assert_eq!(values(text, Field::OperationalDate), vec!["2025"]);
        assert_eq!(values(text, Field::PermittedDate), vec!["2026"]);
        assert_eq!(values("COD: Q4 2025", Field::OperationalDate), vec!["Q4 2025"]);
    }

    #[test]
    fn test_offsets_are_characters() {
        let text = "Zürich — 50 MW";
        let spans = RuleExtractor::with_default_rules(0.95).scan(text);
        let power = spans.iter().find(|s| s.field == Field::CapacityMw).unwrap();
        assert_eq!(text::char_slice(text, power.start, power.end), Some("50 MW"));
    }

    #[test]
    fn test_spec_validation() {
        let bad = RuleSpec::new(Field::Location, r"(unclosed");
        assert!(matches!(bad.compile(0.9), Err(RuleError::Pattern { .. })));

        let no_group = RuleSpec::new(Field::Location, r"near \w+");
        assert!(matches!(
            no_group.compile(0.9),
            Err(RuleError::MissingGroup { group: 1, .. })
        ));

        let confident = RuleSpec::new(Field::Location, r"near (\w+)").with_confidence(1.5);
        assert!(matches!(confident.compile(0.9), Err(RuleError::Confidence(_))));
    }

    #[test]
    fn test_custom_rules_from_json() {
        let json = r#"[
            {"field": "developer", "pattern": "partner (\\w+)", "confidence": 0.8},
            {"field": "location", "pattern": "(broken"}
        ]"#;
        let specs = RuleSpec::from_json(json).unwrap();
        assert_eq!(specs[0].value_group, 1);
        assert_eq!(specs[0].precedence, 0);

        let extractor = RuleExtractor::from_specs(&specs, 0.95);
        assert_eq!(extractor.rules().len(), 1);

        let spans = extractor.scan("with partner Rondo today");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Rondo");
        assert!((spans[0].confidence - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_extractor_trait() {
        let extractor = RuleExtractor::with_default_rules(0.95);
        let spans = extractor.extract("Project Alpha is a 10 MW plant").await.unwrap();
        assert_eq!(extractor.source(), SpanSource::Rule);
        assert!(spans.iter().all(|s| (s.confidence - 0.95).abs() < f64::EPSILON));
        assert_eq!(spans.len(), 2);
    }
}
