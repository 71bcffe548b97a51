//! Adapter around a pre-trained span-labeling model.
//!
//! The adapter does no extraction of its own. It maps the model's label
//! vocabulary onto [`Field`]s and its scores onto the engine's confidence
//! scale, and rejects output it cannot trust.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::extractor::{ExtractionResult, Extractor, RawSpan};
use crate::config::RecognizerConfig;
use crate::field::{Field, SpanSource};
use crate::http::{EndpointClient, HttpError};
use crate::text;

#[derive(Debug, Clone, Error)]
pub enum RecognizerError {
    #[error("Recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed recognizer output: {0}")]
    Malformed(String),
}

pub type RecognizerResult<T> = Result<T, RecognizerError>;

impl From<HttpError> for RecognizerError {
    fn from(e: HttpError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// One labelled span as reported by a model. Offsets are characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSpan {
    pub label: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub score: Option<f64>,
}

impl LabeledSpan {
    #[must_use]
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            score: None,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

#[async_trait::async_trait]
pub trait SpanModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn predict(&self, text: &str) -> RecognizerResult<Vec<LabeledSpan>>;
}

/// Model label vocabulary to field names. Lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: HashMap<String, Field>,
}

impl LabelMap {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: &str, field: Field) -> Self {
        self.labels.insert(label.trim().to_uppercase(), field);
        self
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<Field> {
        self.labels.get(&label.trim().to_uppercase()).copied()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for field in Field::ALL {
            map = map.with_label(field.as_str(), field);
        }
        [
            ("PROJECT", Field::ProjectName),
            ("Project name", Field::ProjectName),
            ("POWER", Field::CapacityMw),
            ("Discharging Power Capacity (MW)", Field::CapacityMw),
            ("ENERGY", Field::CapacityMwh),
            ("Energy Capacity (MWh)", Field::CapacityMwh),
            ("DURATION", Field::DurationHours),
            ("TECH", Field::Technology),
            ("COMPANY", Field::Developer),
            ("LOC", Field::Location),
            ("COST", Field::Capex),
            ("Total Cost (Capex)", Field::Capex),
            ("ANNOUNCED", Field::AnnouncedDate),
            ("PERMIT_DATE", Field::PermittedDate),
            ("CONSTRUCTION_START", Field::ConstructionDate),
            ("COD", Field::OperationalDate),
            ("Expected COD year", Field::OperationalDate),
        ]
        .into_iter()
        .fold(map, |map, (label, field)| map.with_label(label, field))
    }
}

pub struct RecognizerAdapter {
    model: Arc<dyn SpanModel>,
    labels: LabelMap,
    config: RecognizerConfig,
}

impl RecognizerAdapter {
    #[must_use]
    pub fn new(model: Arc<dyn SpanModel>, config: RecognizerConfig) -> Self {
        Self {
            model,
            labels: LabelMap::default(),
            config,
        }
    }

    fn confidence(&self, score: Option<f64>) -> f64 {
        score.map_or(self.config.default_confidence, |s| {
            (s * self.config.score_weight).clamp(0.0, 1.0)
        })
    }

    /// Map raw model output onto fields. Any span that does not fit the text
    /// makes the whole output untrustworthy.
    pub fn map_spans(&self, text: &str, spans: Vec<LabeledSpan>) -> RecognizerResult<Vec<RawSpan>> {
        let mut mapped = Vec::with_capacity(spans.len());
        for span in spans {
            if span.score.is_some_and(|s| !s.is_finite() || s < 0.0) {
                return Err(RecognizerError::Malformed(format!(
                    "score {:?} for label {}",
                    span.score, span.label
                )));
            }
            let value = text::char_slice(text, span.start, span.end)
                .filter(|_| span.start < span.end)
                .ok_or_else(|| {
                    RecognizerError::Malformed(format!(
                        "span {}..{} outside text of {} chars",
                        span.start,
                        span.end,
                        text.chars().count()
                    ))
                })?;

            let Some(field) = self.labels.get(&span.label) else {
                tracing::debug!(label = %span.label, "Unmapped recognizer label");
                continue;
            };

            let cleaned = text::clean_value(value);
            if cleaned.is_empty() {
                continue;
            }
            mapped.push(
                RawSpan::new(field, cleaned, SpanSource::Recognizer, self.confidence(span.score))
                    .at(span.start, span.end),
            );
        }
        Ok(mapped)
    }

    pub async fn recognize(&self, text: &str) -> RecognizerResult<Vec<RawSpan>> {
        let spans = tokio::time::timeout(self.config.timeout(), self.model.predict(text))
            .await
            .map_err(|_| {
                RecognizerError::Unavailable(format!(
                    "{} timed out after {:?}",
                    self.model.model_id(),
                    self.config.timeout()
                ))
            })??;
        self.map_spans(text, spans)
    }
}

#[async_trait::async_trait]
impl Extractor for RecognizerAdapter {
    fn source(&self) -> SpanSource {
        SpanSource::Recognizer
    }

    async fn extract(&self, text: &str) -> ExtractionResult<Vec<RawSpan>> {
        Ok(self.recognize(text).await?)
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    entities: Vec<LabeledSpan>,
}

/// A span-labeling model served over HTTP.
///
/// Sends `{"text": ...}` and expects `{"entities": [{label, start, end, score}]}`.
pub struct HttpSpanModel {
    client: EndpointClient,
    model_id: String,
}

impl HttpSpanModel {
    pub fn new(endpoint: &str, timeout: Duration) -> RecognizerResult<Self> {
        let client = EndpointClient::new(endpoint, timeout)?;
        let model_id = client.endpoint().to_string();
        Ok(Self { client, model_id })
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

#[async_trait::async_trait]
impl SpanModel for HttpSpanModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn predict(&self, text: &str) -> RecognizerResult<Vec<LabeledSpan>> {
        let response = self
            .client
            .post_json("", &PredictRequest { text }, None)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognizerError::Unavailable(format!(
                "{} returned {status}",
                self.model_id
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::Malformed(e.to_string()))?;
        Ok(body.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(Vec<LabeledSpan>);

    #[async_trait::async_trait]
    impl SpanModel for FixedModel {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn predict(&self, _text: &str) -> RecognizerResult<Vec<LabeledSpan>> {
            Ok(self.0.clone())
        }
    }

    struct SlowModel;

    #[async_trait::async_trait]
    impl SpanModel for SlowModel {
        fn model_id(&self) -> &str {
            "slow"
        }

        async fn predict(&self, _text: &str) -> RecognizerResult<Vec<LabeledSpan>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn adapter(spans: Vec<LabeledSpan>) -> RecognizerAdapter {
        RecognizerAdapter::new(Arc::new(FixedModel(spans)), RecognizerConfig::default())
    }

    const TEXT: &str = "Hydrostor plans Willow Rock, a 500 MW facility in Kern County.";

    #[tokio::test]
    async fn test_maps_labels_and_scores() {
        let spans = adapter(vec![
            LabeledSpan::new("COMPANY", 0, 9).with_score(0.92),
            LabeledSpan::new("project_name", 16, 27),
            LabeledSpan::new("Discharging Power Capacity (MW)", 31, 37).with_score(1.4),
            LabeledSpan::new("PERSON", 0, 9).with_score(0.5),
        ])
        .recognize(TEXT)
        .await
        .unwrap();

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].field, Field::Developer);
        assert_eq!(spans[0].text, "Hydrostor");
        assert!((spans[0].confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(spans[1].field, Field::ProjectName);
        assert_eq!(spans[1].text, "Willow Rock");
        assert!((spans[1].confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(spans[2].text, "500 MW");
        assert!((spans[2].confidence - 1.0).abs() < f64::EPSILON);
        assert!(spans.iter().all(|s| s.source == SpanSource::Recognizer));
    }

    #[tokio::test]
    async fn test_expected_cod_year_label() {
        let text = "Expected online in 2026";
        let spans = adapter(vec![LabeledSpan::new("Expected COD year", 19, 23)])
            .recognize(text)
            .await
            .unwrap();
        assert_eq!(spans[0].field, Field::OperationalDate);
        assert_eq!(spans[0].text, "2026");
    }

    #[tokio::test]
    async fn test_out_of_bounds_span_is_malformed() {
        let result = adapter(vec![LabeledSpan::new("COMPANY", 50, 500)])
            .recognize(TEXT)
            .await;
        assert!(matches!(result, Err(RecognizerError::Malformed(_))));

        let inverted = adapter(vec![LabeledSpan::new("COMPANY", 9, 0)])
            .recognize(TEXT)
            .await;
        assert!(matches!(inverted, Err(RecognizerError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_nan_score_is_malformed() {
        let result = adapter(vec![LabeledSpan::new("COMPANY", 0, 9).with_score(f64::NAN)])
            .recognize(TEXT)
            .await;
        assert!(matches!(result, Err(RecognizerError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unavailable() {
        let adapter = RecognizerAdapter::new(Arc::new(SlowModel), RecognizerConfig::default());
        let result = adapter.recognize(TEXT).await;
        assert!(matches!(result, Err(RecognizerError::Unavailable(msg)) if msg.contains("slow")));
    }

    #[test]
    fn test_label_map_is_case_insensitive() {
        let map = LabelMap::default();
        assert_eq!(map.get("expected cod year"), Some(Field::OperationalDate));
        assert_eq!(map.get("Capacity_MWh"), Some(Field::CapacityMwh));
        assert_eq!(map.get("ORG"), None);
    }

    #[test]
    fn test_http_model_rejects_bad_endpoint() {
        assert!(HttpSpanModel::new("nope", Duration::from_secs(1)).is_err());
    }
}
