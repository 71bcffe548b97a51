//! Extraction and normalization of energy-storage project records from
//! unstructured documents.

pub mod config;
pub mod error;
pub mod field;
pub mod http;
pub mod ingest;
pub mod issue;
pub mod normalize;
pub mod record;
pub mod taxonomy;
pub mod text;
pub mod validate;

pub use config::{
    EngineConfig, LlmConfig, RecognizerConfig, ResolverConfig, TaxonomyPaths, TimelineConfig,
    TrustThresholds,
};
pub use error::{Error, Result};
pub use field::{Field, Sector, SpanSource};
pub use ingest::{
    BatchReport, DocumentReport, ExtractionEngine, HttpSpanModel, OpenAiCompatibleProvider,
    Outcome, RuleExtractor, RuleSpec, SourceDocument,
};
pub use issue::Issue;
pub use normalize::{EntityResolver, Resolution};
pub use record::{EntityMatch, ProjectRecord};
pub use taxonomy::{EntityClass, Taxonomy};
pub use validate::{ValidationError, ValidationStatus, Validator};
