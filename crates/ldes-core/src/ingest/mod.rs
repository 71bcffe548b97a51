mod disambiguator;
mod extractor;
mod llm;
mod merge;
mod pipeline;
mod recognizer;
mod rules;

pub use disambiguator::{
    Disambiguation, DisambiguationOutcome, DisambiguationRequest, Disambiguator,
};
pub use extractor::{ExtractionError, ExtractionResult, Extractor, RawSpan};
pub use llm::{LlmError, LlmProvider, LlmRequest, LlmResult, OpenAiCompatibleProvider};
pub use merge::{
    merge, merge_field, Candidate, CandidateRecord, EscalationReason, FieldDecision, ValueKeyer,
};
pub use pipeline::{
    BatchReport, BatchStats, DocumentReport, DocumentStats, ExtractionEngine, Outcome,
    SourceDocument,
};
pub use recognizer::{
    HttpSpanModel, LabelMap, LabeledSpan, RecognizerAdapter, RecognizerError, RecognizerResult,
    SpanModel,
};
pub use rules::{ExtractionRule, RuleError, RuleExtractor, RuleResult, RuleSpec};
