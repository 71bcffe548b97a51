use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::disambiguator::{Disambiguation, DisambiguationOutcome, DisambiguationRequest, Disambiguator};
use super::extractor::{ExtractionError, ExtractionResult, Extractor, RawSpan};
use super::llm::LlmProvider;
use super::merge::{merge, EscalationReason, ValueKeyer};
use super::recognizer::{RecognizerAdapter, SpanModel};
use super::rules::RuleExtractor;
use crate::config::EngineConfig;
use crate::field::{Field, Sector, SpanSource};
use crate::issue::Issue;
use crate::normalize::units::parse_money_musd;
use crate::normalize::{Dimension, EntityResolver, Milestone, TimelineExtractor, UnitNormalizer};
use crate::record::{DraftRecord, EntityMatch, ProjectRecord, Provenance};
use crate::taxonomy::{EntityClass, Taxonomy};
use crate::text;
use crate::validate::{ValidationError, ValidationStatus, Validator};

/// A document handed over by ingestion: plain text, already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: String,
    #[serde(default)]
    pub sector: Sector,
    pub text: String,
}

impl SourceDocument {
    #[must_use]
    pub fn new(source_id: impl Into<String>, sector: Sector, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            sector,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Accepted { record: ProjectRecord },
    /// Structurally valid but held for human review
    Flagged { record: ProjectRecord },
    Rejected { error: ValidationError },
    Failed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub rule_spans: usize,
    pub recognizer_spans: usize,
    pub accepted_fields: usize,
    pub escalated_fields: usize,
    pub llm_resolved_fields: usize,
    pub duration_ms: u64,
}

/// Everything the engine has to say about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source_id: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disambiguations: Vec<Disambiguation>,
    pub stats: DocumentStats,
}

impl DocumentReport {
    #[must_use]
    pub fn failed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            outcome: Outcome::Failed {
                reason: reason.into(),
            },
            issues: Vec::new(),
            disambiguations: Vec::new(),
            stats: DocumentStats::default(),
        }
    }

    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        match self.outcome {
            Outcome::Accepted { .. } => ValidationStatus::Accepted,
            Outcome::Flagged { .. } => ValidationStatus::Flagged,
            Outcome::Rejected { .. } => ValidationStatus::Rejected,
            Outcome::Failed { .. } => ValidationStatus::Error,
        }
    }

    /// The records this document produced: none, or one.
    #[must_use]
    pub fn records(&self) -> Vec<&ProjectRecord> {
        match &self.outcome {
            Outcome::Accepted { record } | Outcome::Flagged { record } => vec![record],
            Outcome::Rejected { .. } | Outcome::Failed { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&ProjectRecord> {
        self.records().into_iter().next()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents: usize,
    pub accepted: usize,
    pub flagged: usize,
    pub rejected: usize,
    pub failed: usize,
    pub issues: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    #[must_use]
    pub fn records(&self) -> usize {
        self.accepted + self.flagged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub reports: Vec<DocumentReport>,
    pub stats: BatchStats,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, report: DocumentReport) {
        self.stats.documents += 1;
        match report.status() {
            ValidationStatus::Accepted => self.stats.accepted += 1,
            ValidationStatus::Flagged => self.stats.flagged += 1,
            ValidationStatus::Rejected => self.stats.rejected += 1,
            ValidationStatus::Error => self.stats.failed += 1,
        }
        self.stats.issues += report.issues.len();
        self.stats.duration_ms += report.stats.duration_ms;
        self.reports.push(report);
    }

    pub fn records(&self) -> impl Iterator<Item = &ProjectRecord> {
        self.reports.iter().flat_map(DocumentReport::records)
    }
}

/// Field value that survived merging or disambiguation.
struct Settled {
    value: String,
    provenance: Provenance,
}

fn dimension_field(dimension: Dimension) -> Field {
    match dimension {
        Dimension::Power => Field::CapacityMw,
        Dimension::Energy => Field::CapacityMwh,
        Dimension::Duration => Field::DurationHours,
    }
}

/// Turns document text into validated project records.
///
/// Holds only read-only state, so one engine serves many documents at once.
pub struct ExtractionEngine {
    config: Arc<EngineConfig>,
    rules: Box<dyn Extractor>,
    recognizer: Option<Box<dyn Extractor>>,
    disambiguator: Option<Disambiguator>,
    resolver: EntityResolver,
    units: UnitNormalizer,
    timeline: TimelineExtractor,
    validator: Validator,
}

impl ExtractionEngine {
    pub fn new(config: EngineConfig, taxonomy: Arc<Taxonomy>) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            rules: Box::new(RuleExtractor::with_default_rules(config.rule_confidence)),
            recognizer: None,
            disambiguator: None,
            resolver: EntityResolver::new(taxonomy, &config.resolver),
            units: UnitNormalizer::new(config.capacity_tolerance),
            timeline: TimelineExtractor::new(&config.timeline),
            validator: Validator::new(),
            config: Arc::new(config),
        })
    }

    /// Replace the rule extractor.
    #[must_use]
    pub fn with_rules(mut self, rules: Box<dyn Extractor>) -> Self {
        self.rules = rules;
        self
    }

    /// Add a second extractor that runs alongside the rules. Its failures
    /// degrade the document to rule output instead of failing it.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn Extractor>) -> Self {
        self.recognizer = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_recognizer(self, model: Arc<dyn SpanModel>) -> Self {
        let adapter = RecognizerAdapter::new(model, self.config.recognizer.clone());
        self.with_extractor(Box::new(adapter))
    }

    #[must_use]
    pub fn with_llm(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.disambiguator = Some(Disambiguator::new(provider, self.config.llm.clone()));
        self
    }

    async fn recognize(&self, text: &str, issues: &mut Vec<Issue>) -> Vec<RawSpan> {
        let Some(extractor) = &self.recognizer else {
            return Vec::new();
        };
        let result = extractor.extract(text).await;
        Self::spans_or_degrade(extractor.as_ref(), result, issues)
    }

    /// Spans from one extractor, or nothing plus an issue when it failed.
    fn spans_or_degrade(
        extractor: &dyn Extractor,
        result: ExtractionResult<Vec<RawSpan>>,
        issues: &mut Vec<Issue>,
    ) -> Vec<RawSpan> {
        match result {
            Ok(spans) => spans,
            Err(ExtractionError::Recognizer(e)) => {
                tracing::warn!(source = %extractor.source(), error = %e, "Extractor unavailable, continuing without it");
                issues.push(Issue::RecognizerUnavailable {
                    reason: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Which escalations go to the LLM. Without one, conflicts and weak
    /// values are recorded as unresolved.
    fn plan_escalations(
        &self,
        escalations: impl Iterator<Item = DisambiguationRequest>,
        issues: &mut Vec<Issue>,
    ) -> Vec<DisambiguationRequest> {
        let mut requests = Vec::new();
        for request in escalations {
            let wanted = request.reason != EscalationReason::Missing
                || self.config.llm.fill_missing.contains(&request.field);
            if self.disambiguator.is_some() && wanted {
                requests.push(request);
            } else if request.reason != EscalationReason::Missing {
                issues.push(Issue::UnresolvedField {
                    field: request.field,
                    reason: request.reason,
                });
            }
        }
        requests
    }

    fn apply_disambiguations(
        disambiguations: &[Disambiguation],
        settled: &mut BTreeMap<Field, Settled>,
        issues: &mut Vec<Issue>,
    ) {
        let mut failures: BTreeMap<&str, Vec<Field>> = BTreeMap::new();
        for d in disambiguations {
            match &d.outcome {
                DisambiguationOutcome::Resolved {
                    value, confidence, ..
                } => {
                    settled.insert(
                        d.field,
                        Settled {
                            value: value.clone(),
                            provenance: Provenance {
                                sources: vec![SpanSource::Llm],
                                confidence: *confidence,
                            },
                        },
                    );
                }
                DisambiguationOutcome::Declined { .. } => issues.push(Issue::UnresolvedField {
                    field: d.field,
                    reason: d.reason,
                }),
                DisambiguationOutcome::Failed { error } => {
                    failures.entry(error.as_str()).or_default().push(d.field);
                }
            }
        }
        issues.extend(failures.into_iter().map(|(reason, fields)| Issue::LlmFailed {
            fields,
            reason: reason.to_string(),
        }));
    }

    /// Run the normalizers over the settled values and assemble a draft.
    fn build_draft(
        &self,
        source_id: &str,
        sector: Sector,
        text: &str,
        settled: BTreeMap<Field, Settled>,
        issues: &mut Vec<Issue>,
    ) -> DraftRecord {
        let value = |field: Field| settled.get(&field).map(|s| s.value.as_str());
        let mut draft = DraftRecord::new(source_id, sector);

        let capacity = self.units.normalize(
            value(Field::CapacityMw),
            value(Field::CapacityMwh),
            value(Field::DurationHours),
        );
        for (dimension, error) in capacity.errors {
            let field = dimension_field(dimension);
            issues.push(Issue::UnitParse {
                field,
                text: value(field).unwrap_or_default().to_string(),
                error: error.to_string(),
            });
        }
        draft = draft.with_capacity(capacity.triple);

        if let Some(raw) = value(Field::Capex) {
            match parse_money_musd(raw) {
                Ok(musd) => draft.capex_musd = Some(musd),
                Err(e) => issues.push(Issue::UnitParse {
                    field: Field::Capex,
                    text: raw.to_string(),
                    error: e.to_string(),
                }),
            }
        }

        if let Some(raw) = value(Field::Technology) {
            let resolution = self.resolver.resolve(raw, EntityClass::Technology);
            draft = draft.with_technology(EntityMatch::from_resolution(raw, resolution));
        }
        if let Some(raw) = value(Field::Developer) {
            let resolution = self.resolver.resolve(raw, EntityClass::Company);
            draft = draft.with_developer(EntityMatch::from_resolution(raw, resolution));
        }
        if let Some(name) = value(Field::ProjectName) {
            draft = draft.with_project_name(name);
        }
        if let Some(location) = value(Field::Location) {
            draft = draft.with_location(location);
        }

        let labeled: Vec<(Milestone, String)> = Milestone::ALL
            .into_iter()
            .filter_map(|m| value(m.field()).map(|v| (m, v.to_string())))
            .collect();
        for (milestone, raw) in &labeled {
            if crate::normalize::timeline::parse_date(raw).is_none() {
                issues.push(Issue::InvalidValue {
                    field: milestone.field(),
                    text: raw.clone(),
                });
            }
        }
        draft = draft.with_timeline(self.timeline.assemble(&labeled, text));

        draft.provenance = settled
            .into_iter()
            .map(|(field, s)| (field, s.provenance))
            .collect();
        draft
    }

    /// Process one document. Never fails: every problem below the document
    /// level ends up in the report's issues.
    pub async fn submit_document(&self, text: &str, sector: Sector, source_id: &str) -> DocumentReport {
        let start = Instant::now();
        let text = text::clean_document(text);
        let mut issues = Vec::new();
        let mut stats = DocumentStats::default();

        let (rule_spans, recognized) = tokio::join!(
            self.rules.extract(&text),
            self.recognize(&text, &mut issues)
        );
        let rule_spans = Self::spans_or_degrade(self.rules.as_ref(), rule_spans, &mut issues);
        stats.rule_spans = rule_spans.len();
        stats.recognizer_spans = recognized.len();

        let mut spans = rule_spans;
        spans.extend(recognized);

        let keyer = ValueKeyer::new(&self.resolver);
        let candidates = merge(&spans, &self.config.thresholds, &keyer);

        let mut settled: BTreeMap<Field, Settled> = candidates
            .accepted()
            .map(|(field, value, provenance)| {
                (
                    field,
                    Settled {
                        value: value.to_string(),
                        provenance,
                    },
                )
            })
            .collect();
        stats.accepted_fields = settled.len();

        let escalations = candidates.escalations().map(|(field, reason, cands)| {
            DisambiguationRequest::new(field, reason, cands.to_vec())
        });
        let requests = self.plan_escalations(escalations, &mut issues);
        stats.escalated_fields = requests.len();

        let mut disambiguations = Vec::new();
        if let Some(disambiguator) = &self.disambiguator {
            if !requests.is_empty() {
                disambiguations = disambiguator.disambiguate(&text, sector, &requests).await;
                Self::apply_disambiguations(&disambiguations, &mut settled, &mut issues);
            }
        }
        stats.llm_resolved_fields = disambiguations
            .iter()
            .filter(|d| matches!(d.outcome, DisambiguationOutcome::Resolved { .. }))
            .count();

        let draft = self.build_draft(source_id, sector, &text, settled, &mut issues);

        let outcome = match self.validator.validate(draft) {
            Ok(validated) => {
                issues.extend(validated.findings);
                match validated.status {
                    ValidationStatus::Flagged => Outcome::Flagged {
                        record: validated.record,
                    },
                    _ => Outcome::Accepted {
                        record: validated.record,
                    },
                }
            }
            Err(error) => Outcome::Rejected { error },
        };

        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = DocumentReport {
            source_id: source_id.to_string(),
            outcome,
            issues,
            disambiguations,
            stats,
        };

        tracing::info!(
            source_id,
            status = %report.status(),
            issues = report.issues.len(),
            escalated = report.stats.escalated_fields,
            duration_ms = report.stats.duration_ms,
            "Document processed"
        );
        report
    }

    /// Process documents concurrently, at most `max_concurrent_documents` at
    /// a time. Reports come back in input order; a document whose task dies
    /// is reported as failed without affecting the others.
    pub async fn submit_batch(self: &Arc<Self>, documents: Vec<SourceDocument>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents));

        let handles: Vec<_> = documents
            .into_iter()
            .map(|doc| {
                let engine = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                let source_id = doc.source_id.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    engine
                        .submit_document(&doc.text, doc.sector, &doc.source_id)
                        .await
                });
                (source_id, handle)
            })
            .collect();

        let mut batch = BatchReport::new();
        for (source_id, handle) in handles {
            match handle.await {
                Ok(report) => batch.add(report),
                Err(e) => {
                    tracing::error!(source_id = %source_id, error = %e, "Document task failed");
                    batch.add(DocumentReport::failed(source_id, e.to_string()));
                }
            }
        }

        tracing::info!(
            documents = batch.stats.documents,
            records = batch.stats.records(),
            rejected = batch.stats.rejected,
            failed = batch.stats.failed,
            "Batch processed"
        );
        batch
    }
}
