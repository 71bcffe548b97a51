use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::field::Field;

/// Minimum confidence at which a single uncontested extractor value is
/// accepted without escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustThresholds {
    /// Threshold for fields without an explicit override
    pub default: f64,
    /// Per-field overrides
    pub per_field: BTreeMap<Field, f64>,
}

impl Default for TrustThresholds {
    fn default() -> Self {
        let mut per_field = BTreeMap::new();
        // Names are where the recognizer most often clips or over-extends a span.
        per_field.insert(Field::ProjectName, 0.75);
        per_field.insert(Field::Developer, 0.75);
        Self {
            default: 0.70,
            per_field,
        }
    }
}

impl TrustThresholds {
    #[must_use]
    pub fn for_field(&self, field: Field) -> f64 {
        self.per_field.get(&field).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum normalized edit similarity for a fuzzy match
    pub similarity_floor: f64,
    /// Two fuzzy candidates closer than this are treated as ambiguous
    pub ambiguity_margin: f64,
    /// Mentions shorter than this (after normalization) never fuzzy-match
    pub min_fuzzy_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.85,
            ambiguity_margin: 0.02,
            min_fuzzy_len: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Confidence assigned when the model reports no score
    pub default_confidence: f64,
    /// Multiplier applied to model scores before clamping into [0, 1]
    pub score_weight: f64,
    /// Upper bound on a recognizer call
    pub timeout_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            default_confidence: 0.6,
            score_weight: 1.0,
            timeout_ms: 10_000,
        }
    }
}

impl RecognizerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Per-attempt timeout for one disambiguation call
    pub timeout_ms: u64,
    /// Sustained request budget
    pub requests_per_minute: u32,
    /// Maximum fields resolved by a single call
    pub max_batch_fields: usize,
    /// Retries after a rate-limit response
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub backoff_base_ms: u64,
    /// Characters of document text sent as context
    pub context_chars: usize,
    /// Confidence assigned when the model omits one
    pub default_confidence: f64,
    /// Fields escalated when no extractor produced a value
    pub fill_missing: Vec<Field>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            requests_per_minute: 30,
            max_batch_fields: 6,
            max_retries: 3,
            backoff_base_ms: 500,
            context_chars: 2000,
            default_confidence: 0.7,
            fill_missing: vec![
                Field::ProjectName,
                Field::CapacityMw,
                Field::CapacityMwh,
                Field::DurationHours,
                Field::Technology,
                Field::Developer,
                Field::Location,
            ],
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Characters either side of a date searched for trigger phrases
    pub trigger_window: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { trigger_window: 80 }
    }
}

/// Reference data locations. `None` falls back to the bundled taxonomy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyPaths {
    pub companies: Option<PathBuf>,
    pub technologies: Option<PathBuf>,
}

/// Static configuration bundle consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: TrustThresholds,
    pub resolver: ResolverConfig,
    /// Relative tolerance for power x duration = energy
    pub capacity_tolerance: f64,
    /// Confidence attached to every rule match
    pub rule_confidence: f64,
    pub recognizer: RecognizerConfig,
    pub llm: LlmConfig,
    pub timeline: TimelineConfig,
    pub taxonomy: TaxonomyPaths,
    /// Documents processed at once by `submit_batch`
    pub max_concurrent_documents: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: TrustThresholds::default(),
            resolver: ResolverConfig::default(),
            capacity_tolerance: 0.05,
            rule_confidence: 0.95,
            recognizer: RecognizerConfig::default(),
            llm: LlmConfig::default(),
            timeline: TimelineConfig::default(),
            taxonomy: TaxonomyPaths::default(),
            max_concurrent_documents: 4,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange(name.to_string(), v))
            }
        };

        unit("thresholds.default", self.thresholds.default)?;
        for (field, v) in &self.thresholds.per_field {
            unit(&format!("thresholds.per_field.{field}"), *v)?;
        }
        unit("resolver.similarity_floor", self.resolver.similarity_floor)?;
        unit("resolver.ambiguity_margin", self.resolver.ambiguity_margin)?;
        unit("capacity_tolerance", self.capacity_tolerance)?;
        unit("rule_confidence", self.rule_confidence)?;
        unit("recognizer.default_confidence", self.recognizer.default_confidence)?;
        unit("llm.default_confidence", self.llm.default_confidence)?;

        if self.recognizer.score_weight <= 0.0 {
            return Err(ConfigError::OutOfRange(
                "recognizer.score_weight".into(),
                self.recognizer.score_weight,
            ));
        }
        if self.llm.requests_per_minute == 0 {
            return Err(ConfigError::Zero("llm.requests_per_minute"));
        }
        if self.llm.max_batch_fields == 0 {
            return Err(ConfigError::Zero("llm.max_batch_fields"));
        }
        if self.llm.timeout_ms == 0 {
            return Err(ConfigError::Zero("llm.timeout_ms"));
        }
        if self.max_concurrent_documents == 0 {
            return Err(ConfigError::Zero("max_concurrent_documents"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be within [0, 1], got {1}")]
    OutOfRange(String, f64),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
